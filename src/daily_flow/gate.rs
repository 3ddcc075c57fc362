use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::store::{JsonStoreExt, KeyValueStore};

const ENABLE_LOGS: bool = true;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FlowKind {
    MorningBriefing,
    EveningReflection,
    WindDown,
}

impl FlowKind {
    /// Priority order used when more than one flow is eligible.
    pub const ALL: [FlowKind; 3] = [
        FlowKind::MorningBriefing,
        FlowKind::EveningReflection,
        FlowKind::WindDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::MorningBriefing => "morningBriefing",
            FlowKind::EveningReflection => "eveningReflection",
            FlowKind::WindDown => "windDown",
        }
    }

    pub fn window(&self) -> FlowWindow {
        match self {
            FlowKind::MorningBriefing => FlowWindow::hours(5, Some(11)),
            FlowKind::EveningReflection => FlowWindow::hours(18, Some(22)),
            FlowKind::WindDown => FlowWindow::hours(22, None),
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            FlowKind::MorningBriefing => "Good morning! Want a quick look at your day?",
            FlowKind::EveningReflection => "How did today go? Want to reflect for a minute?",
            FlowKind::WindDown => "It's getting late. Ready to start winding down?",
        }
    }

    fn store_key(&self) -> String {
        format!("daily_flow:{}:lastFired", self.as_str())
    }
}

/// Half-open time-of-day window `[start, end)`; no end means midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowWindow {
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
}

impl FlowWindow {
    fn hours(start: u32, end: Option<u32>) -> Self {
        let at = |hour| NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            start: at(start),
            end: end.map(at),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && self.end.map_or(true, |end| time < end)
    }
}

/// First flow, in priority order, whose window contains `now` and which has
/// not fired on `now`'s calendar date.
pub fn eligible_flow<F>(now: NaiveDateTime, enabled: &[FlowKind], last_fired: F) -> Option<FlowKind>
where
    F: Fn(FlowKind) -> Option<NaiveDate>,
{
    let today = now.date();
    FlowKind::ALL.into_iter().find(|kind| {
        enabled.contains(kind)
            && kind.window().contains(now.time())
            && last_fired(*kind) != Some(today)
    })
}

/// Once-per-calendar-day gate over the daily prompts, persisted as
/// `YYYY-MM-DD` strings. Dates are compared by equality, so clock or
/// timezone changes can make a flow fire twice or skip a day.
#[derive(Clone)]
pub struct DailyFlowGate {
    store: Arc<dyn KeyValueStore>,
    enabled: Vec<FlowKind>,
}

impl DailyFlowGate {
    pub fn new(store: Arc<dyn KeyValueStore>, enabled: Vec<FlowKind>) -> Self {
        Self { store, enabled }
    }

    pub fn last_fired(&self, kind: FlowKind) -> Option<NaiveDate> {
        let raw: String = self.store.get_json(&kind.store_key())?;
        NaiveDate::parse_from_str(&raw, DATE_FORMAT).ok()
    }

    /// Which flow could fire now, without marking it.
    pub fn eligible(&self, now: NaiveDateTime) -> Option<FlowKind> {
        eligible_flow(now, &self.enabled, |kind| self.last_fired(kind))
    }

    /// Picks the eligible flow and marks it fired for today.
    pub fn fire(&self, now: NaiveDateTime) -> Result<Option<FlowKind>> {
        let Some(kind) = self.eligible(now) else {
            return Ok(None);
        };
        self.mark_fired(kind, now.date())?;
        crate::log_info!("Daily flow {} fired for {}", kind.as_str(), now.date());
        Ok(Some(kind))
    }

    /// Records that `kind` ran on `date`, whatever the user chose. Idempotent.
    pub fn mark_fired(&self, kind: FlowKind, date: NaiveDate) -> Result<()> {
        if self.last_fired(kind) == Some(date) {
            return Ok(());
        }
        self.store
            .set_json(&kind.store_key(), &date.format(DATE_FORMAT).to_string())
    }

    pub fn reset(&self, kind: FlowKind) -> Result<()> {
        self.store.remove(&kind.store_key())
    }

    pub fn reset_all(&self) -> Result<()> {
        for kind in FlowKind::ALL {
            self.reset(kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn gate() -> (DailyFlowGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (DailyFlowGate::new(store.clone(), FlowKind::ALL.to_vec()), store)
    }

    #[test]
    fn morning_fires_once_per_day() {
        let (gate, _) = gate();
        gate.mark_fired(FlowKind::MorningBriefing, at(1, 6, 0).date())
            .unwrap();

        assert_eq!(gate.fire(at(2, 6, 0)).unwrap(), Some(FlowKind::MorningBriefing));
        assert_eq!(gate.fire(at(2, 6, 5)).unwrap(), None);
        assert_eq!(gate.fire(at(3, 5, 0)).unwrap(), Some(FlowKind::MorningBriefing));
    }

    #[test]
    fn windows_are_half_open() {
        let (gate, _) = gate();
        assert_eq!(gate.eligible(at(2, 4, 59)), None);
        assert_eq!(gate.eligible(at(2, 5, 0)), Some(FlowKind::MorningBriefing));
        assert_eq!(gate.eligible(at(2, 11, 0)), None);
        assert_eq!(gate.eligible(at(2, 21, 59)), Some(FlowKind::EveningReflection));
        assert_eq!(gate.eligible(at(2, 22, 0)), Some(FlowKind::WindDown));
        assert_eq!(gate.eligible(at(2, 23, 59)), Some(FlowKind::WindDown));
    }

    #[test]
    fn eligibility_does_not_mark() {
        let (gate, _) = gate();
        assert!(gate.eligible(at(2, 7, 0)).is_some());
        assert!(gate.eligible(at(2, 7, 0)).is_some());
        assert_eq!(gate.last_fired(FlowKind::MorningBriefing), None);
    }

    #[test]
    fn marking_twice_is_idempotent() {
        let (gate, store) = gate();
        let day = at(2, 19, 0).date();
        gate.mark_fired(FlowKind::EveningReflection, day).unwrap();
        let before = store.get_raw("daily_flow:eveningReflection:lastFired");
        gate.mark_fired(FlowKind::EveningReflection, day).unwrap();

        assert_eq!(store.get_raw("daily_flow:eveningReflection:lastFired"), before);
        assert_eq!(before.as_deref(), Some("\"2026-03-02\""));
        assert_eq!(gate.eligible(at(2, 19, 30)), None);
    }

    #[test]
    fn disabled_flows_never_fire() {
        let store = Arc::new(MemoryStore::new());
        let gate = DailyFlowGate::new(store, vec![FlowKind::EveningReflection]);
        assert_eq!(gate.eligible(at(2, 6, 0)), None);
        assert_eq!(gate.eligible(at(2, 22, 30)), None);
        assert_eq!(gate.eligible(at(2, 18, 0)), Some(FlowKind::EveningReflection));
    }

    #[test]
    fn corrupt_dates_read_as_never_fired() {
        let (gate, store) = gate();
        store
            .set_raw("daily_flow:morningBriefing:lastFired", "\"yesterday\"".into())
            .unwrap();
        assert_eq!(gate.last_fired(FlowKind::MorningBriefing), None);
        assert_eq!(gate.eligible(at(2, 6, 0)), Some(FlowKind::MorningBriefing));
    }

    #[test]
    fn reset_allows_refiring() {
        let (gate, _) = gate();
        gate.fire(at(2, 6, 0)).unwrap();
        gate.reset_all().unwrap();
        assert_eq!(gate.fire(at(2, 6, 1)).unwrap(), Some(FlowKind::MorningBriefing));
    }
}
