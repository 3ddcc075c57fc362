use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Behavioral cue extracted from a user message during a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Pain,
    Fatigue,
    Distraction,
    Frustration,
    Confusion,
    PauseRequest,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Pain => "pain",
            SignalKind::Fatigue => "fatigue",
            SignalKind::Distraction => "distraction",
            SignalKind::Frustration => "frustration",
            SignalKind::Confusion => "confusion",
            SignalKind::PauseRequest => "pauseRequest",
        }
    }

    /// Kinds that should interrupt whatever the companion is doing.
    pub fn is_safety_relevant(&self) -> bool {
        matches!(self, SignalKind::Pain)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub kind: SignalKind,
    pub at: DateTime<Utc>,
    pub text: Option<String>,
}

impl SignalEvent {
    pub fn new(kind: SignalKind, at: DateTime<Utc>, text: Option<String>) -> Self {
        Self { kind, at, text }
    }

    pub fn is_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.at) <= window
    }
}
