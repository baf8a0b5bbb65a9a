//! Sweep completion tracking for the consolidated position broadcast
//!
//! A sweep is complete once every registered prisoner has reported at least
//! once since the previous broadcast. Ids are never assumed to be sequential.

use crate::domain::types::EntityId;
use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct SweepTracker {
    registered: FxHashSet<EntityId>,
    pending: FxHashSet<EntityId>,
}

impl SweepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start expecting reports from a newly registered prisoner
    pub fn register(&mut self, id: EntityId) {
        self.registered.insert(id);
        self.pending.insert(id);
    }

    /// Record a report. Returns true when this report completes the sweep,
    /// in which case the next sweep starts immediately.
    pub fn record(&mut self, id: EntityId) -> bool {
        if !self.pending.remove(&id) {
            return false;
        }
        if self.pending.is_empty() {
            self.restart();
            return true;
        }
        false
    }

    /// Begin a new sweep expecting every registered prisoner
    pub fn restart(&mut self) {
        self.pending = self.registered.clone();
    }

    /// Prisoners not yet heard from in the current sweep
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.registered.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_after_every_prisoner_reports() {
        let mut sweep = SweepTracker::new();
        for id in [1, 2, 3] {
            sweep.register(EntityId(id));
        }

        assert!(!sweep.record(EntityId(1)));
        assert!(!sweep.record(EntityId(1))); // repeat does not count twice
        assert!(!sweep.record(EntityId(3)));
        assert!(sweep.record(EntityId(2)));
        assert_eq!(sweep.pending(), 3);
    }

    #[test]
    fn test_non_sequential_ids() {
        let mut sweep = SweepTracker::new();
        sweep.register(EntityId(40));
        sweep.register(EntityId(7));

        assert!(!sweep.record(EntityId(40)));
        assert!(sweep.record(EntityId(7)));
    }

    #[test]
    fn test_unregistered_reports_are_ignored() {
        let mut sweep = SweepTracker::new();
        assert!(!sweep.record(EntityId(99)));

        sweep.register(EntityId(1));
        assert!(!sweep.record(EntityId(99)));
        assert!(sweep.record(EntityId(1)));
    }

    #[test]
    fn test_restart_and_clear() {
        let mut sweep = SweepTracker::new();
        sweep.register(EntityId(1));
        sweep.register(EntityId(2));
        sweep.record(EntityId(1));
        assert_eq!(sweep.pending(), 1);

        sweep.restart();
        assert_eq!(sweep.pending(), 2);

        sweep.clear();
        assert_eq!(sweep.pending(), 0);
        assert!(!sweep.record(EntityId(1)));
    }
}
