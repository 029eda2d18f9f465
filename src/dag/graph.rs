// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use crate::config::model::ConfigFile;
use crate::dag::task::TaskSpec;
use crate::engine::TaskId;
use crate::errors::{Result, TaskdagError};

/// Internal node structure: the task spec plus adjacency in both directions.
#[derive(Debug, Clone)]
struct GraphNode {
    spec: TaskSpec,
    /// Direct dependencies: tasks that must finish before this one can run.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskId>,
}

/// Immutable-once-built DAG of tasks keyed by task id.
///
/// Shape errors are caught at construction: `add_task` rejects duplicate
/// ids, `add_edge` rejects unknown endpoints and edges that would close a
/// cycle. A failed `add_edge` leaves the graph unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: HashMap<TaskId, GraphNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a validated [`ConfigFile`].
    ///
    /// Validation already guarantees unique ids, known `after` references and
    /// acyclicity, so the `add_task` / `add_edge` calls here cannot fail.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut graph = Self::new();

        for (id, tc) in cfg.task.iter() {
            let spec = TaskSpec::from_config(id.clone(), tc, &cfg.workflow);
            graph
                .add_task(spec)
                .expect("validated config yielded a duplicate task id");
        }

        for (id, tc) in cfg.task.iter() {
            for dep in tc.after.iter() {
                graph
                    .add_edge(dep, id)
                    .expect("validated config yielded an invalid edge");
            }
        }

        graph
    }

    /// Add a task to the graph.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<()> {
        if self.nodes.contains_key(&spec.id) {
            return Err(TaskdagError::DuplicateTask(spec.id));
        }

        self.nodes.insert(
            spec.id.clone(),
            GraphNode {
                spec,
                deps: Vec::new(),
                dependents: Vec::new(),
            },
        );
        Ok(())
    }

    /// Add a dependency edge: `upstream` must finish before `downstream`.
    ///
    /// Fails with `UnknownTask` if either endpoint is absent, and with
    /// `DagCycle` if `upstream` is already reachable from `downstream`
    /// (inserting the edge would close a cycle). On failure the graph is
    /// left exactly as it was.
    pub fn add_edge(&mut self, upstream: &str, downstream: &str) -> Result<()> {
        if !self.nodes.contains_key(upstream) {
            return Err(TaskdagError::UnknownTask(upstream.to_string()));
        }
        if !self.nodes.contains_key(downstream) {
            return Err(TaskdagError::UnknownTask(downstream.to_string()));
        }
        if upstream == downstream || self.reachable(downstream, upstream) {
            return Err(TaskdagError::DagCycle(format!(
                "edge '{upstream}' -> '{downstream}' would create a cycle"
            )));
        }

        // Ignore duplicate edges rather than double-counting them.
        if let Some(node) = self.nodes.get_mut(downstream) {
            if node.deps.iter().any(|d| d == upstream) {
                return Ok(());
            }
            node.deps.push(upstream.to_string());
        }
        if let Some(node) = self.nodes.get_mut(upstream) {
            node.dependents.push(downstream.to_string());
        }
        Ok(())
    }

    /// Depth-first reachability over dependent edges: is `to` reachable
    /// from `from`?
    fn reachable(&self, from: &str, to: &str) -> bool {
        let mut stack: Vec<&str> = vec![from];
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.dependents.iter().map(|s| s.as_str()));
            }
        }

        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All task ids.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// The static spec of a task, if present.
    pub fn spec_of(&self, id: &str) -> Option<&TaskSpec> {
        self.nodes.get(id).map(|n| &n.spec)
    }

    /// Immediate dependencies of a task (its declared upstream tasks).
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes.get(id).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that declare it upstream).
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks with no upstream dependencies.
    pub fn roots(&self) -> Vec<TaskId> {
        let mut roots: Vec<TaskId> = self
            .nodes
            .values()
            .filter(|n| n.deps.is_empty())
            .map(|n| n.spec.id.clone())
            .collect();
        roots.sort();
        roots
    }

    /// Lazy sequence of dependency layers.
    ///
    /// Each batch holds exactly the tasks whose upstream dependencies all
    /// appear in prior batches; the first batch is the roots. The iterator
    /// consumes its own bookkeeping and cannot be restarted, but calling
    /// `topological_batches()` again on the unmodified graph yields batches
    /// with the same sets of ids.
    pub fn topological_batches(&self) -> TopologicalBatches<'_> {
        let in_degrees = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.deps.len()))
            .collect();
        TopologicalBatches {
            graph: self,
            in_degrees,
        }
    }
}

/// Iterator over dependency layers of a [`TaskGraph`]. See
/// [`TaskGraph::topological_batches`].
#[derive(Debug)]
pub struct TopologicalBatches<'a> {
    graph: &'a TaskGraph,
    /// Remaining upstream count per not-yet-emitted task.
    in_degrees: HashMap<TaskId, usize>,
}

impl<'a> Iterator for TopologicalBatches<'a> {
    type Item = Vec<TaskId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.in_degrees.is_empty() {
            return None;
        }

        let mut batch: Vec<TaskId> = self
            .in_degrees
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| id.clone())
            .collect();
        batch.sort();

        // Acyclicity is enforced at construction, so an empty frontier with
        // tasks remaining cannot happen; bail rather than spin if it does.
        if batch.is_empty() {
            self.in_degrees.clear();
            return None;
        }

        for id in &batch {
            self.in_degrees.remove(id);
            for dependent in self.graph.dependents_of(id) {
                if let Some(deg) = self.in_degrees.get_mut(dependent) {
                    *deg = deg.saturating_sub(1);
                }
            }
        }

        Some(batch)
    }
}
