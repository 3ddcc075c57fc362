use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

use crate::models::{InteractionSession, SessionPhase, SignalEvent, SignalKind};

use super::controller::{FocusController, FocusSnapshot};

/// Base focus operations. [`RhythmAwareFocus`] wraps any implementation.
#[allow(async_fn_in_trait)]
pub trait FocusCapability {
    async fn start(&self, duration_ms: u64) -> Result<FocusSnapshot>;
    async fn pause(&self) -> Result<FocusSnapshot>;
    async fn resume(&self) -> Result<FocusSnapshot>;
    async fn stop(&self) -> Result<InteractionSession>;
    async fn cancel(&self) -> Result<InteractionSession>;
    async fn snapshot(&self) -> FocusSnapshot;
    async fn observe(&self, text: &str) -> Option<SignalEvent>;
    /// Archived sessions, oldest first.
    async fn history(&self) -> Vec<InteractionSession>;
}

impl FocusCapability for FocusController {
    async fn start(&self, duration_ms: u64) -> Result<FocusSnapshot> {
        FocusController::start(self, duration_ms).await
    }

    async fn pause(&self) -> Result<FocusSnapshot> {
        FocusController::pause(self).await
    }

    async fn resume(&self) -> Result<FocusSnapshot> {
        FocusController::resume(self).await
    }

    async fn stop(&self) -> Result<InteractionSession> {
        FocusController::stop(self).await
    }

    async fn cancel(&self) -> Result<InteractionSession> {
        FocusController::cancel(self).await
    }

    async fn snapshot(&self) -> FocusSnapshot {
        FocusController::snapshot(self).await
    }

    async fn observe(&self, text: &str) -> Option<SignalEvent> {
        FocusController::observe(self, text).await
    }

    async fn history(&self) -> Vec<InteractionSession> {
        FocusController::history(self).await
    }
}

/// Energy profile over the day, used to size focus blocks.
#[derive(Debug, Clone)]
pub struct RhythmProfile {
    /// Windows where longer blocks work well, as `[start, end)`.
    pub peak_windows: Vec<(NaiveTime, NaiveTime)>,
    pub dip_windows: Vec<(NaiveTime, NaiveTime)>,
    pub peak_minutes: u64,
    pub standard_minutes: u64,
    pub dip_minutes: u64,
    pub late_minutes: u64,
    /// Local hour from which (and until 06:00) only short blocks are suggested.
    pub late_after_hour: u32,
    pub min_minutes: u64,
}

impl Default for RhythmProfile {
    fn default() -> Self {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            peak_windows: vec![(t(9), t(12)), (t(15), t(17))],
            dip_windows: vec![(t(13), t(15))],
            peak_minutes: 50,
            standard_minutes: 25,
            dip_minutes: 20,
            late_minutes: 15,
            late_after_hour: 21,
            min_minutes: 10,
        }
    }
}

impl RhythmProfile {
    pub fn base_minutes(&self, local_time: NaiveTime) -> u64 {
        let within = |windows: &[(NaiveTime, NaiveTime)]| {
            windows
                .iter()
                .any(|(start, end)| local_time >= *start && local_time < *end)
        };

        if local_time.hour() >= self.late_after_hour || local_time.hour() < 6 {
            self.late_minutes
        } else if within(&self.peak_windows) {
            self.peak_minutes
        } else if within(&self.dip_windows) {
            self.dip_minutes
        } else {
            self.standard_minutes
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakSuggestion {
    /// Fatigue showed up recently; suggest stopping for `minutes`.
    Rest { minutes: u64 },
    /// A pain signal: stop now and look after yourself.
    Stop,
}

/// Focus capability decorated with time-of-day awareness.
///
/// Every base operation is forwarded unchanged; the additions only suggest
/// durations and breaks.
pub struct RhythmAwareFocus<F: FocusCapability> {
    base: F,
    profile: RhythmProfile,
}

impl<F: FocusCapability> RhythmAwareFocus<F> {
    pub fn new(base: F, profile: RhythmProfile) -> Self {
        Self { base, profile }
    }

    pub fn base(&self) -> &F {
        &self.base
    }

    /// Suggested block length, halved (down to a floor) after recent fatigue.
    pub fn suggested_minutes(&self, local_time: NaiveTime, recent_fatigue: bool) -> u64 {
        let base = self.profile.base_minutes(local_time);
        if recent_fatigue {
            (base / 2).max(self.profile.min_minutes)
        } else {
            base
        }
    }

    pub async fn start_suggested(&self, local_time: NaiveTime) -> Result<FocusSnapshot> {
        let now = Utc::now();
        let window = Duration::minutes(30);
        let tired = |session: &InteractionSession| {
            session.has_recent_signal(SignalKind::Fatigue, window, now)
        };

        // The live session is replaced by the new one; otherwise the last
        // archived one still counts while its signals are fresh.
        let fatigued = match self.base.snapshot().await.session {
            Some(live) => tired(&live),
            None => self.base.history().await.last().is_some_and(tired),
        };
        let minutes = self.suggested_minutes(local_time, fatigued);
        self.base.start(minutes * 60_000).await
    }

    pub fn break_suggestion(
        &self,
        snapshot: &FocusSnapshot,
        now: DateTime<Utc>,
    ) -> Option<BreakSuggestion> {
        let session = snapshot.session.as_ref()?;
        if snapshot.phase != SessionPhase::Active {
            return None;
        }
        let window = Duration::minutes(5);
        if session.has_recent_signal(SignalKind::Pain, window, now) {
            return Some(BreakSuggestion::Stop);
        }
        let fatigue_count = session
            .recent_signals(Duration::minutes(15), now)
            .into_iter()
            .filter(|event| event.kind == SignalKind::Fatigue)
            .count();
        (fatigue_count > 0).then(|| BreakSuggestion::Rest {
            minutes: if fatigue_count > 1 { 15 } else { 5 },
        })
    }
}

impl<F: FocusCapability> FocusCapability for RhythmAwareFocus<F> {
    async fn start(&self, duration_ms: u64) -> Result<FocusSnapshot> {
        self.base.start(duration_ms).await
    }

    async fn pause(&self) -> Result<FocusSnapshot> {
        self.base.pause().await
    }

    async fn resume(&self) -> Result<FocusSnapshot> {
        self.base.resume().await
    }

    async fn stop(&self) -> Result<InteractionSession> {
        self.base.stop().await
    }

    async fn cancel(&self) -> Result<InteractionSession> {
        self.base.cancel().await
    }

    async fn snapshot(&self) -> FocusSnapshot {
        self.base.snapshot().await
    }

    async fn observe(&self, text: &str) -> Option<SignalEvent> {
        self.base.observe(text).await
    }

    async fn history(&self) -> Vec<InteractionSession> {
        self.base.history().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rhythm() -> RhythmAwareFocus<FocusController> {
        let controller = FocusController::new(Arc::new(MemoryStore::new()), 50);
        RhythmAwareFocus::new(controller, RhythmProfile::default())
    }

    #[test]
    fn durations_follow_the_day() {
        let focus = rhythm();
        assert_eq!(focus.suggested_minutes(time(10, 0), false), 50);
        assert_eq!(focus.suggested_minutes(time(13, 30), false), 20);
        assert_eq!(focus.suggested_minutes(time(8, 0), false), 25);
        assert_eq!(focus.suggested_minutes(time(22, 0), false), 15);
        assert_eq!(focus.suggested_minutes(time(3, 0), false), 15);
    }

    #[test]
    fn fatigue_halves_with_a_floor() {
        let focus = rhythm();
        assert_eq!(focus.suggested_minutes(time(10, 0), true), 25);
        assert_eq!(focus.suggested_minutes(time(22, 0), true), 10);
    }

    #[tokio::test]
    async fn forwards_to_the_base_controller() {
        let focus = rhythm();
        let snapshot = focus.start_suggested(time(10, 0)).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(
            snapshot.session.as_ref().and_then(|s| s.duration_ms),
            Some(50 * 60_000)
        );

        assert_eq!(
            FocusCapability::pause(&focus).await.unwrap().phase,
            SessionPhase::Paused
        );
        FocusCapability::cancel(&focus).await.unwrap();
        assert_eq!(
            FocusCapability::snapshot(focus.base()).await.phase,
            SessionPhase::Idle
        );
    }

    #[tokio::test]
    async fn fatigue_from_a_finished_session_shortens_the_next_one() {
        let focus = rhythm();
        FocusCapability::start(&focus, 60 * 60_000).await.unwrap();
        FocusCapability::observe(&focus, "so tired").await.unwrap();
        FocusCapability::stop(&focus).await.unwrap();
        assert!(FocusCapability::snapshot(&focus).await.session.is_none());

        let snapshot = focus.start_suggested(time(10, 0)).await.unwrap();
        assert_eq!(
            snapshot.session.as_ref().and_then(|s| s.duration_ms),
            Some(25 * 60_000)
        );
        FocusCapability::cancel(&focus).await.unwrap();

        // The cancelled session carried no fatigue, so the peak length is back.
        let rested = focus.start_suggested(time(10, 0)).await.unwrap();
        assert_eq!(
            rested.session.as_ref().and_then(|s| s.duration_ms),
            Some(50 * 60_000)
        );
        FocusCapability::cancel(&focus).await.unwrap();
    }

    #[tokio::test]
    async fn break_suggestions_from_signals() {
        let focus = rhythm();
        FocusCapability::start(&focus, 60 * 60_000).await.unwrap();

        let now = Utc::now();
        let quiet = FocusCapability::snapshot(&focus).await;
        assert_eq!(focus.break_suggestion(&quiet, now), None);

        FocusCapability::observe(&focus, "so tired").await.unwrap();
        let tired = FocusCapability::snapshot(&focus).await;
        assert_eq!(
            focus.break_suggestion(&tired, Utc::now()),
            Some(BreakSuggestion::Rest { minutes: 5 })
        );

        FocusCapability::observe(&focus, "my back hurts").await.unwrap();
        let hurting = FocusCapability::snapshot(&focus).await;
        assert_eq!(
            focus.break_suggestion(&hurting, Utc::now()),
            Some(BreakSuggestion::Stop)
        );
        FocusCapability::cancel(&focus).await.unwrap();
    }
}
