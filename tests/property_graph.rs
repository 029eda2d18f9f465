// tests/property_graph.rs
//
// Property tests for graph construction and topological batching.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use taskdag::dag::{Action, TaskGraph, TaskSpec};
use taskdag::errors::TaskdagError;

/// Strategy for a valid DAG: task N may only depend on tasks 0..N-1, which
/// guarantees acyclicity by construction.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = TaskGraph> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut graph = TaskGraph::new();
            for i in 0..num_tasks {
                let id = format!("task_{i}");
                graph
                    .add_task(TaskSpec::new(
                        id.clone(),
                        Action::Shell {
                            command: format!("echo {id}"),
                        },
                    ))
                    .unwrap();
            }
            for (i, potential) in raw_deps.into_iter().enumerate() {
                if i == 0 {
                    continue;
                }
                let deps: HashSet<usize> = potential.into_iter().map(|d| d % i).collect();
                for dep in deps {
                    graph
                        .add_edge(&format!("task_{dep}"), &format!("task_{i}"))
                        .unwrap();
                }
            }
            graph
        })
    })
}

/// Map each task id to the index of the batch it appears in.
fn batch_index(batches: &[Vec<String>]) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, batch) in batches.iter().enumerate() {
        for id in batch {
            index.insert(id.clone(), i);
        }
    }
    index
}

/// Every task appears exactly once, and strictly after all its dependencies.
fn assert_batches_valid(graph: &TaskGraph, batches: &[Vec<String>]) {
    let index = batch_index(batches);
    assert_eq!(index.len(), graph.len(), "batches must partition the tasks");

    for id in graph.tasks() {
        let own = index[id];
        for dep in graph.dependencies_of(id) {
            assert!(
                index[dep.as_str()] < own,
                "task {id} scheduled before its dependency {dep}"
            );
        }
    }
}

proptest! {
    #[test]
    fn batches_partition_and_respect_dependencies(graph in dag_strategy(12)) {
        let batches: Vec<Vec<String>> = graph.topological_batches().collect();
        assert_batches_valid(&graph, &batches);
    }

    #[test]
    fn batches_are_idempotent(graph in dag_strategy(12)) {
        let first: Vec<Vec<String>> = graph.topological_batches().collect();
        let second: Vec<Vec<String>> = graph.topological_batches().collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn add_edge_never_corrupts_the_graph(
        graph in dag_strategy(10),
        from in 0..10usize,
        to in 0..10usize,
    ) {
        let mut graph = graph;
        let n = graph.len();
        let upstream = format!("task_{}", from % n);
        let downstream = format!("task_{}", to % n);

        let before: Vec<Vec<String>> = graph.topological_batches().collect();

        match graph.add_edge(&upstream, &downstream) {
            Ok(()) => {
                // Still acyclic: batches must remain a valid layering.
                let after: Vec<Vec<String>> = graph.topological_batches().collect();
                assert_batches_valid(&graph, &after);
            }
            Err(TaskdagError::DagCycle(_)) => {
                // Rejected edge must leave the graph exactly as it was.
                let after: Vec<Vec<String>> = graph.topological_batches().collect();
                prop_assert_eq!(before, after);
            }
            Err(other) => {
                return Err(TestCaseError::fail(format!(
                    "unexpected error from add_edge: {other}"
                )));
            }
        }
    }
}
