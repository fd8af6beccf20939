//! Pool bookkeeping: which units wait, which run, which are done.

use std::collections::HashSet;

use crate::tasks::TaskId;

/// Pending / running sets and the completed count of a [`TaskPool`](crate::TaskPool).
///
/// Each unit enters `pending` on submit, moves to `running` once admitted and is
/// counted as completed exactly once, either when it finishes or when the pool
/// cancels it. Completed ids are not retained.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pending: HashSet<TaskId>,
    running: HashSet<TaskId>,
    completed: usize,
    peak_running: usize,
}

impl Ledger {
    pub(crate) fn submitted(&mut self, id: TaskId) {
        self.pending.insert(id);
    }

    /// Moves `id` from pending to running. Returns `false` if it was not pending.
    pub(crate) fn admitted(&mut self, id: TaskId) -> bool {
        if !self.pending.remove(&id) {
            return false;
        }
        self.running.insert(id);
        self.peak_running = self.peak_running.max(self.running.len());
        true
    }

    /// Moves `id` to completed unless it already got there.
    pub(crate) fn finished(&mut self, id: TaskId) {
        if self.pending.remove(&id) || self.running.remove(&id) {
            self.completed += 1;
        }
    }

    /// Moves every pending and running unit to completed.
    pub(crate) fn cancel_all(&mut self) {
        self.completed += self.pending.len() + self.running.len();
        self.pending.clear();
        self.running.clear();
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn running(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed
    }

    pub(crate) fn peak_running(&self) -> usize {
        self.peak_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_unit_completes_once() {
        let mut ledger = Ledger::default();
        let (a, b) = (TaskId::next(), TaskId::next());
        ledger.submitted(a);
        ledger.submitted(b);

        assert!(ledger.admitted(a));
        assert!(!ledger.admitted(a));
        assert_eq!((ledger.pending(), ledger.running()), (1, 1));

        ledger.cancel_all();
        ledger.finished(a);
        ledger.finished(b);
        assert!(!ledger.admitted(b));

        assert_eq!(ledger.completed(), 2);
        assert_eq!((ledger.pending(), ledger.running()), (0, 0));
        assert_eq!(ledger.peak_running(), 1);
    }

    #[test]
    fn reused_ledger_only_counts_completions() {
        let mut ledger = Ledger::default();
        for _ in 0..1000 {
            let id = TaskId::next();
            ledger.submitted(id);
            ledger.admitted(id);
            ledger.finished(id);
            ledger.finished(id);
        }

        assert_eq!(ledger.completed(), 1000);
        assert_eq!((ledger.pending(), ledger.running()), (0, 0));
        assert_eq!(ledger.peak_running(), 1);
    }
}
