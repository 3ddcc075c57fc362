use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SignalEvent, SignalKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Focus,
    Humor,
    Game,
    CheckIn,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Focus => "focus",
            SessionKind::Humor => "humor",
            SessionKind::Game => "game",
            SessionKind::CheckIn => "checkIn",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Offered,
    Confirmed,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Offered => "Offered",
            SessionPhase::Confirmed => "Confirmed",
            SessionPhase::Active => "Active",
            SessionPhase::Paused => "Paused",
            SessionPhase::Completed => "Completed",
            SessionPhase::Cancelled => "Cancelled",
        }
    }

    /// True while the session still occupies its kind's slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionPhase::Offered
                | SessionPhase::Confirmed
                | SessionPhase::Active
                | SessionPhase::Paused
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Cancelled)
    }
}

/// One bounded activity: a focus block, a joke, a game round, a check-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSession {
    pub id: String,
    pub kind: SessionKind,
    pub phase: SessionPhase,
    pub started_at: DateTime<Utc>,
    /// Configured length for timed sessions.
    pub duration_ms: Option<u64>,
    pub offered_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    /// Time spent paused across earlier pause windows.
    pub paused_ms: u64,
    pub ended_at: Option<DateTime<Utc>>,
    pub payload: Option<String>,
    #[serde(default)]
    pub signals: Vec<SignalEvent>,
}

impl InteractionSession {
    pub fn new(kind: SessionKind, phase: SessionPhase, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            phase,
            started_at: now,
            duration_ms: None,
            offered_at: None,
            delivered_at: None,
            paused_at: None,
            paused_ms: 0,
            ended_at: None,
            payload: None,
            signals: Vec::new(),
        }
    }

    /// Milliseconds spent running since delivery, excluding pauses.
    pub fn active_ms(&self, now: DateTime<Utc>) -> u64 {
        let Some(delivered_at) = self.delivered_at else {
            return 0;
        };
        let until = self.ended_at.or(self.paused_at).unwrap_or(now);
        let elapsed = until.signed_duration_since(delivered_at).num_milliseconds();
        (elapsed.max(0) as u64).saturating_sub(self.paused_ms)
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.duration_ms.map(|duration| {
            let duration = i64::try_from(duration).unwrap_or(i64::MAX);
            let active = i64::try_from(self.active_ms(now)).unwrap_or(i64::MAX);
            duration.saturating_sub(active).max(0)
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.phase == SessionPhase::Active && self.remaining_ms(now) == Some(0)
    }

    pub fn record_signal(&mut self, kind: SignalKind, text: Option<String>, now: DateTime<Utc>) {
        self.signals.push(SignalEvent::new(kind, now, text));
    }

    /// Signals seen within `window` of `now`, oldest first.
    pub fn recent_signals(&self, window: Duration, now: DateTime<Utc>) -> Vec<&SignalEvent> {
        self.signals
            .iter()
            .filter(|event| event.is_within(window, now))
            .collect()
    }

    pub fn has_recent_signal(&self, kind: SignalKind, window: Duration, now: DateTime<Utc>) -> bool {
        self.signals
            .iter()
            .any(|event| event.kind == kind && event.is_within(window, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    #[test]
    fn active_ms_excludes_paused_time() {
        let mut session = InteractionSession::new(SessionKind::Focus, SessionPhase::Active, at(9, 0, 0));
        session.delivered_at = Some(at(9, 0, 0));
        session.paused_ms = 60_000;

        assert_eq!(session.active_ms(at(9, 5, 0)), 4 * 60_000);
    }

    #[test]
    fn active_ms_freezes_while_paused() {
        let mut session = InteractionSession::new(SessionKind::Focus, SessionPhase::Paused, at(9, 0, 0));
        session.delivered_at = Some(at(9, 0, 0));
        session.paused_at = Some(at(9, 2, 0));

        assert_eq!(session.active_ms(at(9, 30, 0)), 2 * 60_000);
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let mut session = InteractionSession::new(SessionKind::Focus, SessionPhase::Active, at(9, 0, 0));
        session.delivered_at = Some(at(9, 0, 0));
        session.duration_ms = Some(60_000);

        assert_eq!(session.remaining_ms(at(9, 0, 30)), Some(30_000));
        assert_eq!(session.remaining_ms(at(9, 10, 0)), Some(0));
        assert!(session.is_expired(at(9, 10, 0)));
    }

    #[test]
    fn huge_durations_do_not_wrap_negative() {
        let mut session = InteractionSession::new(SessionKind::Focus, SessionPhase::Active, at(9, 0, 0));
        session.delivered_at = Some(at(9, 0, 0));
        session.duration_ms = Some(u64::MAX);

        assert_eq!(session.remaining_ms(at(9, 1, 0)), Some(i64::MAX - 60_000));
        assert!(!session.is_expired(at(9, 1, 0)));
        assert_eq!(SessionPhase::default(), SessionPhase::Idle);
    }

    #[test]
    fn recency_window_is_computed_at_read_time() {
        let mut session = InteractionSession::new(SessionKind::Focus, SessionPhase::Active, at(9, 0, 0));
        session.record_signal(SignalKind::Confusion, None, at(9, 0, 0));
        session.record_signal(SignalKind::Fatigue, Some("so tired".into()), at(9, 8, 0));

        let recent = session.recent_signals(Duration::minutes(5), at(9, 10, 0));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, SignalKind::Fatigue);
        assert!(!session.has_recent_signal(SignalKind::Confusion, Duration::minutes(5), at(9, 10, 0)));
    }

    #[test]
    fn timestamps_survive_json_round_trip() {
        let mut session = InteractionSession::new(SessionKind::Humor, SessionPhase::Completed, at(9, 0, 0));
        session.payload = Some("joke".into());
        session.ended_at = Some(at(9, 1, 0));

        let raw = serde_json::to_string(&session).unwrap();
        assert!(raw.contains("2026-03-02T09:01:00Z"));
        let back: InteractionSession = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, session);
    }
}
