//! Per-rule execution mutual exclusion.
//!
//! A trigger for a rule that already has an execution in flight is dropped;
//! the in-flight attempt will settle the rule's state either way.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::RuleId;

/// Hands out at most one live [`FlightGuard`] per rule id.
#[derive(Clone, Default)]
pub struct SingleFlight {
    inflight: Arc<Mutex<HashSet<RuleId>>>,
}

impl SingleFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `id`. Returns `None` when an execution is
    /// already in flight.
    #[must_use]
    pub fn begin(&self, id: &RuleId) -> Option<FlightGuard> {
        let mut inflight = self.inflight.lock();
        if !inflight.insert(id.clone()) {
            return None;
        }
        Some(FlightGuard {
            inflight: Arc::clone(&self.inflight),
            id: id.clone(),
        })
    }

    /// Number of executions currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }
}

/// Releases the rule's slot on drop.
pub struct FlightGuard {
    inflight: Arc<Mutex<HashSet<RuleId>>>,
    id: RuleId,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused_while_guard_lives() {
        let flight = SingleFlight::new();
        let id = RuleId::new("r-1");

        let guard = flight.begin(&id);
        assert!(guard.is_some());
        assert!(flight.begin(&id).is_none());

        drop(guard);
        assert!(flight.begin(&id).is_some());
    }

    #[test]
    fn distinct_rules_do_not_contend() {
        let flight = SingleFlight::new();
        let first = flight.begin(&RuleId::new("r-1"));
        let second = flight.begin(&RuleId::new("r-2"));
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(flight.len(), 2);
    }

    #[test]
    fn guard_release_survives_clone() {
        let flight = SingleFlight::new();
        let cloned = flight.clone();
        let id = RuleId::new("r-1");

        let guard = flight.begin(&id).unwrap();
        assert!(cloned.begin(&id).is_none());
        drop(guard);
        assert!(cloned.begin(&id).is_some());
    }
}
