//! Bounded-memory retention of terminal tasks
//!
//! Keeps the task registry from growing without bound in a long-running
//! process: a most-recent-first record of terminal task ids, and a coarse
//! sweep that purges terminal tasks which have fallen out of that record.

use std::collections::{HashMap, HashSet, VecDeque};

use pressroom_core::Task;

/// Most-recent-first record of terminal task ids with a purge sweep.
///
/// Not an LRU: the sweep only runs once the registry holds more than twice
/// the record's capacity, and then drops every terminal task outside the
/// record in one pass. `Pending`/`Processing` tasks are never touched.
pub(crate) struct RetentionPolicy {
    capacity: usize,
    recent: VecDeque<String>,
    members: HashSet<String>,
}

impl RetentionPolicy {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity.min(1024)),
            members: HashSet::new(),
        }
    }

    /// Record a task that just reached a terminal status.
    ///
    /// The oldest recorded id falls out once the record is at capacity.
    pub(crate) fn record(&mut self, task_id: &str) {
        if self.capacity == 0 || self.members.contains(task_id) {
            return;
        }
        self.recent.push_back(task_id.to_string());
        self.members.insert(task_id.to_string());
        while self.recent.len() > self.capacity {
            if let Some(evicted) = self.recent.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    /// Whether an id is still within the recent record.
    pub(crate) fn retains(&self, task_id: &str) -> bool {
        self.members.contains(task_id)
    }

    /// Purge terminal tasks that fell out of the recent record.
    ///
    /// Runs only when the registry exceeds twice the record capacity.
    /// Returns the number of purged tasks.
    pub(crate) fn sweep(&self, tasks: &mut HashMap<String, Task>) -> usize {
        if tasks.len() <= self.capacity * 2 {
            return 0;
        }
        let before = tasks.len();
        tasks.retain(|id, task| !task.is_terminal() || self.retains(id));
        before - tasks.len()
    }

    #[cfg(test)]
    fn recorded(&self) -> usize {
        self.recent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn terminal_task(id: &str) -> Task {
        let mut task = Task::new(id, "ocr", json!({}));
        task.start();
        task.complete(json!({"ok": true}));
        task
    }

    fn registry_of(tasks: Vec<Task>) -> HashMap<String, Task> {
        tasks.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    #[test]
    fn test_record_evicts_oldest() {
        let mut policy = RetentionPolicy::new(2);
        policy.record("a");
        policy.record("b");
        policy.record("c");

        assert_eq!(policy.recorded(), 2);
        assert!(!policy.retains("a"));
        assert!(policy.retains("b"));
        assert!(policy.retains("c"));
    }

    #[test]
    fn test_record_ignores_duplicates() {
        let mut policy = RetentionPolicy::new(2);
        policy.record("a");
        policy.record("a");
        policy.record("b");

        assert_eq!(policy.recorded(), 2);
        assert!(policy.retains("a"));
    }

    #[test]
    fn test_sweep_below_threshold_is_noop() {
        let mut policy = RetentionPolicy::new(2);
        let mut tasks = registry_of(vec![
            terminal_task("a"),
            terminal_task("b"),
            terminal_task("c"),
            terminal_task("d"),
        ]);
        for id in ["a", "b", "c", "d"] {
            policy.record(id);
        }

        // 4 tasks == 2 * capacity: not yet over the threshold.
        assert_eq!(policy.sweep(&mut tasks), 0);
        assert_eq!(tasks.len(), 4);
    }

    #[test]
    fn test_sweep_purges_unrecorded_terminal_tasks() {
        let mut policy = RetentionPolicy::new(2);
        let mut tasks = registry_of(
            ["a", "b", "c", "d", "e"]
                .iter()
                .map(|id| terminal_task(id))
                .collect(),
        );
        for id in ["a", "b", "c", "d", "e"] {
            policy.record(id);
        }

        // Record holds d, e; a, b, c are terminal and outside it.
        let purged = policy.sweep(&mut tasks);
        assert_eq!(purged, 3);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.contains_key("d"));
        assert!(tasks.contains_key("e"));
    }

    #[test]
    fn test_sweep_never_purges_live_tasks() {
        let mut policy = RetentionPolicy::new(1);

        let pending = Task::new("pending", "ocr", json!({}));
        let mut processing = Task::new("processing", "ocr", json!({}));
        processing.start();

        let mut tasks = registry_of(vec![
            pending,
            processing,
            terminal_task("old-1"),
            terminal_task("old-2"),
            terminal_task("recent"),
        ]);
        for id in ["old-1", "old-2", "recent"] {
            policy.record(id);
        }

        let purged = policy.sweep(&mut tasks);
        assert_eq!(purged, 2);
        assert!(tasks.contains_key("pending"));
        assert!(tasks.contains_key("processing"));
        assert!(tasks.contains_key("recent"));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut policy = RetentionPolicy::new(0);
        policy.record("a");
        assert!(!policy.retains("a"));

        let mut tasks = registry_of(vec![terminal_task("a")]);
        assert_eq!(policy.sweep(&mut tasks), 1);
        assert!(tasks.is_empty());
    }
}
