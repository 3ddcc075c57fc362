use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{InteractionSession, SessionKind, SessionPhase, SignalKind};

use super::history::{SessionHistory, DEFAULT_HISTORY_CAP};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("a {kind} session is already {phase}")]
    Busy { kind: &'static str, phase: &'static str },
    #[error("cooling down for another {remaining_secs}s")]
    CoolingDown { remaining_secs: i64 },
    #[error("cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },
    #[error("duration must be greater than zero")]
    ZeroDuration,
}

#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Minimum time between two offers of this kind.
    pub cooldown: Duration,
    pub history_cap: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::zero(),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

/// What a reply to a pending offer did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Confirmed,
    Declined,
    /// Neither yes nor no; the offer stays pending.
    Ignored,
}

/// Lifecycle of one kind of interaction.
///
/// `idle → offered → confirmed → active → completed | cancelled`, with
/// `active ⇄ paused` for timed sessions. At most one live session exists per
/// machine; finished sessions go to a bounded history.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    kind: SessionKind,
    config: MachineConfig,
    current: Option<InteractionSession>,
    last_offer_at: Option<DateTime<Utc>>,
    history: SessionHistory,
}

impl SessionMachine {
    pub fn new(kind: SessionKind, config: MachineConfig) -> Self {
        let history = SessionHistory::new(config.history_cap);
        Self::with_history(kind, config, history)
    }

    pub fn with_history(kind: SessionKind, config: MachineConfig, history: SessionHistory) -> Self {
        Self {
            kind,
            config,
            current: None,
            last_offer_at: None,
            history,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn phase(&self) -> SessionPhase {
        self.current
            .as_ref()
            .map(|session| session.phase)
            .unwrap_or_default()
    }

    pub fn current(&self) -> Option<&InteractionSession> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut SessionHistory {
        &mut self.history
    }

    pub fn last_offer_at(&self) -> Option<DateTime<Utc>> {
        self.last_offer_at
    }

    /// Whether an offer made at `now` would be accepted.
    pub fn check_offer(&self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let phase = self.phase();
        if phase.is_live() {
            return Err(TransitionError::Busy {
                kind: self.kind.as_str(),
                phase: phase.as_str(),
            });
        }
        if let Some(last) = self.last_offer_at {
            let elapsed = now.signed_duration_since(last);
            if elapsed < self.config.cooldown {
                return Err(TransitionError::CoolingDown {
                    remaining_secs: (self.config.cooldown - elapsed).num_seconds().max(1),
                });
            }
        }
        Ok(())
    }

    /// `idle → offered`. Rejected offers leave the cooldown anchor untouched.
    pub fn offer(
        &mut self,
        payload: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&InteractionSession, TransitionError> {
        self.check_offer(now)?;

        let mut session = InteractionSession::new(self.kind, SessionPhase::Offered, now);
        session.offered_at = Some(now);
        session.payload = payload;
        self.last_offer_at = Some(now);

        crate::log_debug!("{} offer made ({})", self.kind.as_str(), session.id);
        Ok(&*self.current.insert(session))
    }

    /// `offered → confirmed`.
    pub fn confirm(&mut self) -> Result<&InteractionSession, TransitionError> {
        let session = self.require(SessionPhase::Offered, "confirm")?;
        session.phase = SessionPhase::Confirmed;
        Ok(&*session)
    }

    /// `offered → idle`. The declined offer is discarded, not archived.
    pub fn decline(&mut self) -> Result<(), TransitionError> {
        self.require(SessionPhase::Offered, "decline")?;
        if let Some(session) = self.current.take() {
            crate::log_debug!("{} offer declined ({})", self.kind.as_str(), session.id);
        }
        Ok(())
    }

    pub fn reply(&mut self, affirmative: Option<bool>) -> Result<ReplyOutcome, TransitionError> {
        match affirmative {
            Some(true) => self.confirm().map(|_| ReplyOutcome::Confirmed),
            Some(false) => self.decline().map(|_| ReplyOutcome::Declined),
            None => {
                self.require(SessionPhase::Offered, "reply to")?;
                Ok(ReplyOutcome::Ignored)
            }
        }
    }

    /// `confirmed → active`, recording the delivery time.
    pub fn deliver(
        &mut self,
        payload: Option<String>,
        duration_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<&InteractionSession, TransitionError> {
        if duration_ms == Some(0) {
            return Err(TransitionError::ZeroDuration);
        }
        let session = self.require(SessionPhase::Confirmed, "deliver")?;
        session.phase = SessionPhase::Active;
        session.delivered_at = Some(now);
        session.duration_ms = duration_ms;
        if payload.is_some() {
            session.payload = payload;
        }
        Ok(&*session)
    }

    /// Explicit user start, skipping the offer. Any unfinished session of
    /// this kind is archived as cancelled first.
    pub fn start(
        &mut self,
        payload: Option<String>,
        duration_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<&InteractionSession, TransitionError> {
        if duration_ms == Some(0) {
            return Err(TransitionError::ZeroDuration);
        }
        if self.phase().is_live() {
            crate::log_info!(
                "Starting a new {} session replaces the unfinished one",
                self.kind.as_str()
            );
            self.finish(SessionPhase::Cancelled, now);
        }

        let mut session = InteractionSession::new(self.kind, SessionPhase::Active, now);
        session.delivered_at = Some(now);
        session.duration_ms = duration_ms;
        session.payload = payload;
        Ok(&*self.current.insert(session))
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<&InteractionSession, TransitionError> {
        let session = self.require(SessionPhase::Active, "pause")?;
        session.phase = SessionPhase::Paused;
        session.paused_at = Some(now);
        Ok(&*session)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<&InteractionSession, TransitionError> {
        let session = self.require(SessionPhase::Paused, "resume")?;
        if let Some(paused_at) = session.paused_at.take() {
            let paused = now.signed_duration_since(paused_at).num_milliseconds().max(0);
            session.paused_ms = session.paused_ms.saturating_add(paused as u64);
        }
        session.phase = SessionPhase::Active;
        Ok(&*session)
    }

    /// `active | paused → completed`; returns the archived session.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<InteractionSession, TransitionError> {
        let phase = self.phase();
        if !matches!(phase, SessionPhase::Active | SessionPhase::Paused) {
            return Err(TransitionError::InvalidPhase {
                action: "complete",
                phase: phase.as_str(),
            });
        }
        Ok(self.finish(SessionPhase::Completed, now))
    }

    /// Any live phase `→ cancelled`; returns the archived session.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<InteractionSession, TransitionError> {
        let phase = self.phase();
        if !phase.is_live() {
            return Err(TransitionError::InvalidPhase {
                action: "cancel",
                phase: phase.as_str(),
            });
        }
        Ok(self.finish(SessionPhase::Cancelled, now))
    }

    /// Completes a timed session whose duration has run out.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<InteractionSession> {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|session| session.is_expired(now));
        expired.then(|| self.finish(SessionPhase::Completed, now))
    }

    /// Attaches a signal to the live session. Returns false when idle.
    pub fn record_signal(&mut self, kind: SignalKind, text: Option<String>, now: DateTime<Utc>) -> bool {
        match self.current.as_mut() {
            Some(session) if session.phase.is_live() => {
                session.record_signal(kind, text, now);
                true
            }
            _ => false,
        }
    }

    fn require(
        &mut self,
        phase: SessionPhase,
        action: &'static str,
    ) -> Result<&mut InteractionSession, TransitionError> {
        match self.current.as_mut() {
            Some(session) if session.phase == phase => Ok(session),
            other => Err(TransitionError::InvalidPhase {
                action,
                phase: other
                    .map(|session| session.phase)
                    .unwrap_or_default()
                    .as_str(),
            }),
        }
    }

    fn finish(&mut self, phase: SessionPhase, now: DateTime<Utc>) -> InteractionSession {
        let mut session = match self.current.take() {
            Some(session) => session,
            None => InteractionSession::new(self.kind, phase, now),
        };
        if session.phase == SessionPhase::Paused {
            if let Some(paused_at) = session.paused_at.take() {
                let paused = now.signed_duration_since(paused_at).num_milliseconds().max(0);
                session.paused_ms = session.paused_ms.saturating_add(paused as u64);
            }
        }
        session.phase = phase;
        session.ended_at = Some(now);

        crate::log_info!(
            "{} session {} {}",
            self.kind.as_str(),
            session.id,
            phase.as_str().to_lowercase()
        );
        self.history.push(session.clone());
        session
    }
}
