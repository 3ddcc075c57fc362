use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::{
    models::{InteractionSession, SessionKind, SessionPhase},
    signals::{detect_intent, Intent},
    store::KeyValueStore,
};

use super::{
    history::SessionHistory,
    state::{MachineConfig, ReplyOutcome, SessionMachine, TransitionError},
};

const ENABLE_LOGS: bool = true;

pub const DEFAULT_HUMOR_COOLDOWN_MINUTES: i64 = 30;
pub const DEFAULT_STRUGGLE_QUIET_MINUTES: i64 = 10;

const OFFER_PROMPT: &str = "Want to hear a joke? It might be terrible.";

const JOKES: &[&str] = &[
    "Why don't scientists trust atoms? Because they make up everything.",
    "I told my plant a joke. It didn't laugh, but it grew on me.",
    "Why did the scarecrow get promoted? He was outstanding in his field.",
    "I'm reading a book about anti-gravity. It's impossible to put down.",
    "Why do bees have sticky hair? They use honeycombs.",
    "What do you call a fake noodle? An impasta.",
    "Why did the calendar feel popular? It had a lot of dates.",
    "How does the ocean say hi? It waves.",
];

#[derive(Debug, Clone, PartialEq)]
pub enum HumorReply {
    Joke(String),
    Declined,
    /// The user is having a hard time; humor stays off for a while.
    Backoff,
}

/// Offers and delivers jokes, never more often than the cooldown allows and
/// never right after the user signalled they are struggling.
pub struct HumorCompanion {
    machine: SessionMachine,
    struggle_quiet: Duration,
    last_struggle_at: Option<DateTime<Utc>>,
    last_joke: Option<usize>,
}

impl HumorCompanion {
    pub fn new(cooldown: Duration, struggle_quiet: Duration, history: SessionHistory) -> Self {
        let config = MachineConfig {
            cooldown,
            ..MachineConfig::default()
        };
        Self {
            machine: SessionMachine::with_history(SessionKind::Humor, config, history),
            struggle_quiet,
            last_struggle_at: None,
            last_joke: None,
        }
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SessionMachine {
        &mut self.machine
    }

    pub fn save_history(&self, store: &dyn KeyValueStore) -> Result<()> {
        self.machine.history().save(store, SessionKind::Humor)
    }

    fn quiet_until(&self) -> Option<DateTime<Utc>> {
        self.last_struggle_at.map(|at| at + self.struggle_quiet)
    }

    /// Proposes a joke if the cooldown and struggle back-off allow it.
    pub fn try_offer(&mut self, now: DateTime<Utc>) -> Option<&'static str> {
        if self.quiet_until().is_some_and(|until| now < until) {
            crate::log_debug!("Humor offer suppressed after a struggle signal");
            return None;
        }
        match self.machine.offer(None, now) {
            Ok(_) => Some(OFFER_PROMPT),
            Err(err) => {
                crate::log_debug!("Humor offer skipped: {err}");
                None
            }
        }
    }

    /// Routes one user message through the humor flow, with the thread RNG.
    pub fn handle_message(&mut self, text: &str, now: DateTime<Utc>) -> Option<HumorReply> {
        self.handle_message_with(text, now, &mut rand::thread_rng())
    }

    pub fn handle_message_with<R: Rng>(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<HumorReply> {
        let intent = detect_intent(text);

        if intent == Some(Intent::Struggle) {
            self.last_struggle_at = Some(now);
            if self.machine.phase().is_live() {
                if let Err(err) = self.machine.cancel(now) {
                    crate::log_warn!("Could not cancel humor session after struggle: {err}");
                }
            }
            crate::log_info!("Struggle signal; humor backing off");
            return Some(HumorReply::Backoff);
        }

        match self.machine.phase() {
            SessionPhase::Offered => {
                let affirmative = match intent {
                    Some(Intent::Confirmation) | Some(Intent::JokeRequest) => Some(true),
                    Some(Intent::Decline) => Some(false),
                    _ => None,
                };
                match self.machine.reply(affirmative) {
                    Ok(ReplyOutcome::Confirmed) => {
                        self.deliver(now, rng).ok().map(HumorReply::Joke)
                    }
                    Ok(ReplyOutcome::Declined) => Some(HumorReply::Declined),
                    _ => None,
                }
            }
            _ if intent == Some(Intent::JokeRequest) => {
                // Asked for directly: no offer, no cooldown.
                let joke = self.pick_joke(rng);
                self.machine.start(Some(joke.clone()), None, now).ok()?;
                self.machine.complete(now).ok()?;
                Some(HumorReply::Joke(joke))
            }
            _ => None,
        }
    }

    fn deliver<R: Rng>(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<String, TransitionError> {
        let joke = self.pick_joke(rng);
        self.machine.deliver(Some(joke.clone()), None, now)?;
        self.machine.complete(now)?;
        Ok(joke)
    }

    fn pick_joke<R: Rng>(&mut self, rng: &mut R) -> String {
        let mut index = rng.gen_range(0..JOKES.len());
        if Some(index) == self.last_joke {
            index = (index + 1) % JOKES.len();
        }
        self.last_joke = Some(index);
        JOKES[index].to_string()
    }

    pub fn delivered(&self) -> impl Iterator<Item = &InteractionSession> {
        self.machine
            .history()
            .iter()
            .filter(|session| session.phase == SessionPhase::Completed)
    }
}
