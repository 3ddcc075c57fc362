use std::sync::Arc;

use anyhow::Result;

use crate::{models::SessionKind, session::history_key, store::KeyValueStore};

use super::{counters::COUNTER_PREFIX, gate::DailyFlowGate, FlowKind};

const ENABLE_LOGS: bool = true;

/// Reset hooks handed to the host for testing and support tooling.
///
/// Operates on persisted state only; in-memory machines pick up cleared
/// history the next time they are constructed.
#[derive(Clone)]
pub struct DebugController {
    store: Arc<dyn KeyValueStore>,
    gate: DailyFlowGate,
}

impl DebugController {
    pub fn new(store: Arc<dyn KeyValueStore>, gate: DailyFlowGate) -> Self {
        Self { store, gate }
    }

    pub fn reset_flow(&self, kind: FlowKind) -> Result<()> {
        crate::log_warn!("Debug: resetting daily flow {}", kind.as_str());
        self.gate.reset(kind)
    }

    pub fn reset_all_flows(&self) -> Result<()> {
        crate::log_warn!("Debug: resetting all daily flows");
        self.gate.reset_all()
    }

    /// Removes every daily counter; returns how many keys were deleted.
    pub fn reset_counters(&self) -> Result<usize> {
        let keys = self.store.keys_with_prefix(COUNTER_PREFIX);
        for key in &keys {
            self.store.remove(key)?;
        }
        crate::log_warn!("Debug: removed {} counter keys", keys.len());
        Ok(keys.len())
    }

    pub fn clear_history(&self, kind: SessionKind) -> Result<()> {
        crate::log_warn!("Debug: clearing {} history", kind.as_str());
        self.store.remove(&history_key(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily_flow::DailyCounter;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn setup() -> (DebugController, DailyFlowGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let gate = DailyFlowGate::new(store.clone(), FlowKind::ALL.to_vec());
        (DebugController::new(store.clone(), gate.clone()), gate, store)
    }

    #[test]
    fn resetting_a_flow_makes_it_eligible_again() {
        let (debug, gate, _) = setup();
        let morning = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        gate.fire(morning).unwrap();
        assert!(gate.eligible(morning).is_none());

        debug.reset_flow(FlowKind::MorningBriefing).unwrap();
        assert_eq!(gate.eligible(morning), Some(FlowKind::MorningBriefing));
        debug.reset_all_flows().unwrap();
    }

    #[test]
    fn counters_and_history_are_cleared() {
        let (debug, _, store) = setup();
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        DailyCounter::new(store.clone(), "water").increment(today).unwrap();
        DailyCounter::new(store.clone(), "steps").increment(today).unwrap();
        store.set_raw(&history_key(SessionKind::Focus), "[]".into()).unwrap();

        assert_eq!(debug.reset_counters().unwrap(), 4);
        debug.clear_history(SessionKind::Focus).unwrap();
        assert!(store.get_raw(&history_key(SessionKind::Focus)).is_none());
        assert_eq!(debug.reset_counters().unwrap(), 0);
    }
}
