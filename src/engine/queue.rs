// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::RunParams;

/// Queue of run triggers that arrive while a run is already executing.
///
/// Semantics:
/// - Each entry is one requested future run with its own parameter set;
///   triggers are never merged, because their parameters may differ.
/// - `max_pending` bounds how many future runs are remembered. On overflow
///   the oldest request is dropped, keeping the most recent triggers.
/// - When the scheduler goes idle the runtime calls `pop_next()` to start
///   the next queued run, in arrival order.
#[derive(Debug)]
pub struct RunQueue {
    max_pending: usize,
    pending: VecDeque<RunParams>,
}

impl RunQueue {
    /// Create a queue remembering at most `max_pending` future runs.
    ///
    /// `max_pending` is clamped to at least 1; a zero-length queue would
    /// silently drop every trigger.
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending: max_pending.max(1),
            pending: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Record a trigger that arrived while a run was active.
    pub fn record_trigger(&mut self, params: RunParams) {
        self.pending.push_back(params);
        debug!(queued = self.pending.len(), "queued run trigger");

        if self.pending.len() > self.max_pending {
            warn!(
                queued = self.pending.len(),
                max_pending = self.max_pending,
                "run queue overflow; dropping oldest queued trigger"
            );
            while self.pending.len() > self.max_pending {
                self.pending.pop_front();
            }
        }
    }

    /// Take the next queued run request, if any.
    pub fn pop_next(&mut self) -> Option<RunParams> {
        self.pending.pop_front()
    }

    /// Drop everything that was queued (used on cancellation).
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run_params;

    #[test]
    fn triggers_come_back_in_arrival_order() {
        let mut q = RunQueue::new(4);
        q.record_trigger(run_params([("n", "1")]));
        q.record_trigger(run_params([("n", "2")]));

        assert_eq!(q.pop_next().unwrap().get("n").unwrap(), "1");
        assert_eq!(q.pop_next().unwrap().get("n").unwrap(), "2");
        assert!(q.pop_next().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = RunQueue::new(2);
        for n in ["1", "2", "3"] {
            q.record_trigger(run_params([("n", n)]));
        }

        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_next().unwrap().get("n").unwrap(), "2");
        assert_eq!(q.pop_next().unwrap().get("n").unwrap(), "3");
    }
}
