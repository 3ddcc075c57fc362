use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::{
    daily_flow::{DailyCounter, DailyFlowGate, DebugController, FlowKind},
    models::{SessionKind, SessionPhase},
    session::{
        BreakSuggestion, FocusCapability, FocusController, GameReply, GameRound, HumorCompanion,
        HumorReply, MachineConfig, ReplyOutcome, RhythmAwareFocus, RhythmProfile, RoundOutcome,
        SessionHistory, SessionMachine,
    },
    settings::CompanionSettings,
    signals::{detect_intent, Intent},
    store::{self, KeyValueStore},
};

const ENABLE_LOGS: bool = true;

/// Longest focus block `/focus <minutes>` accepts.
pub const MAX_FOCUS_MINUTES: u64 = 24 * 60;

const HELP: &str = "Commands: /focus [minutes], /pause, /resume, /stop, /cancel, /status, \
/water, /debug flows|counters|history <focus|humor|game|checkin>, /help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Focus(Option<u64>),
    Pause,
    Resume,
    Stop,
    Cancel,
    Status,
    Water,
    DebugFlows,
    DebugCounters,
    DebugHistory(SessionKind),
    Help,
    Unknown(String),
}

impl Command {
    /// Parses a `/`-prefixed line; plain chat returns `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let rest = line.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        let command = match (name.as_str(), arg) {
            ("focus", None) => Command::Focus(None),
            ("focus", Some(minutes)) => match minutes.parse::<u64>() {
                Ok(minutes) if (1..=MAX_FOCUS_MINUTES).contains(&minutes) => {
                    Command::Focus(Some(minutes))
                }
                _ => Command::Unknown(line.trim().to_string()),
            },
            ("pause", _) => Command::Pause,
            ("resume", _) => Command::Resume,
            ("stop", _) => Command::Stop,
            ("cancel", _) => Command::Cancel,
            ("status", _) => Command::Status,
            ("water", _) => Command::Water,
            ("debug", Some("flows")) => Command::DebugFlows,
            ("debug", Some("counters")) => Command::DebugCounters,
            ("debug", Some("history")) => match parts.next() {
                Some("focus") => Command::DebugHistory(SessionKind::Focus),
                Some("humor") => Command::DebugHistory(SessionKind::Humor),
                Some("game") => Command::DebugHistory(SessionKind::Game),
                Some("checkin") => Command::DebugHistory(SessionKind::CheckIn),
                _ => Command::Unknown(line.trim().to_string()),
            },
            ("help", _) => Command::Help,
            _ => Command::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

/// Everything one user talks to: focus timer, humor, games, daily prompts
/// and counters, all sharing one store.
pub struct Companion {
    store: Arc<dyn KeyValueStore>,
    focus: RhythmAwareFocus<FocusController>,
    humor: HumorCompanion,
    game: GameRound,
    check_in: SessionMachine,
    pending_flow: Option<FlowKind>,
    gate: DailyFlowGate,
    water: DailyCounter,
    debug: DebugController,
}

impl Companion {
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &CompanionSettings) -> Self {
        let cap = settings.history_cap;
        let focus = FocusController::new(store.clone(), cap);
        let humor = HumorCompanion::new(
            settings.humor_cooldown(),
            settings.struggle_quiet(),
            SessionHistory::load(store.as_ref(), SessionKind::Humor, cap),
        );
        let game = GameRound::new(
            settings.game_cooldown(),
            SessionHistory::load(store.as_ref(), SessionKind::Game, cap),
        );
        let check_in = SessionMachine::with_history(
            SessionKind::CheckIn,
            MachineConfig {
                history_cap: cap,
                ..MachineConfig::default()
            },
            SessionHistory::load(store.as_ref(), SessionKind::CheckIn, cap),
        );
        let gate = DailyFlowGate::new(store.clone(), settings.enabled_flows.clone());
        let profile = RhythmProfile {
            standard_minutes: settings.default_focus_minutes.max(1),
            ..RhythmProfile::default()
        };

        Self {
            focus: RhythmAwareFocus::new(focus, profile),
            humor,
            game,
            check_in,
            pending_flow: None,
            water: DailyCounter::new(store.clone(), "water"),
            debug: DebugController::new(store.clone(), gate.clone()),
            gate,
            store,
        }
    }

    pub fn focus(&self) -> &FocusController {
        self.focus.base()
    }

    /// Handles one line from the user and returns the replies to show.
    /// Persistence failures are logged; the user still gets a reply.
    pub async fn handle_line(&mut self, line: &str) -> Vec<String> {
        let local = Local::now().naive_local();
        self.handle_line_at(line, local, Utc::now()).await
    }

    pub async fn handle_line_at(
        &mut self,
        line: &str,
        local: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let mut replies = Vec::new();
        match store::blocking(|| self.gate.fire(local)) {
            Ok(Some(flow)) => {
                self.offer_check_in(flow, now);
                replies.push(flow.prompt().to_string());
            }
            Ok(None) => {}
            Err(err) => crate::log_error!("Daily flow check failed: {err:#}"),
        }

        match Command::parse(line) {
            Some(command) => replies.push(self.run_command(command, local).await),
            None => replies.extend(self.chat(line, now).await),
        }
        replies
    }

    async fn run_command(&mut self, command: Command, local: NaiveDateTime) -> String {
        match command {
            Command::Focus(minutes) => {
                let started = match minutes {
                    Some(minutes) => match minutes.checked_mul(60_000) {
                        Some(duration_ms) => FocusCapability::start(&self.focus, duration_ms).await,
                        None => return format!("{minutes} minutes is too long for one session."),
                    },
                    None => self.focus.start_suggested(local.time()).await,
                };
                match started {
                    Ok(snapshot) => {
                        let minutes = snapshot
                            .session
                            .and_then(|session| session.duration_ms)
                            .unwrap_or(0)
                            / 60_000;
                        format!("Focus session started: {minutes} minutes. You've got this.")
                    }
                    Err(err) => format!("Couldn't start focus: {err}"),
                }
            }
            Command::Pause => describe(FocusCapability::pause(&self.focus).await.map(|_| "Paused.")),
            Command::Resume => describe(
                FocusCapability::resume(&self.focus)
                    .await
                    .map(|_| "Back to it."),
            ),
            Command::Stop => describe(
                FocusCapability::stop(&self.focus)
                    .await
                    .map(|_| "Nice work! Session saved."),
            ),
            Command::Cancel => describe(
                FocusCapability::cancel(&self.focus)
                    .await
                    .map(|_| "Session cancelled."),
            ),
            Command::Status => {
                let snapshot = FocusCapability::snapshot(&self.focus).await;
                match snapshot.remaining_ms {
                    Some(remaining) if snapshot.phase.is_live() => format!(
                        "Focus {}: {} min left.",
                        snapshot.phase.as_str(),
                        remaining.max(0) / 60_000
                    ),
                    _ => format!("Focus {}.", snapshot.phase.as_str()),
                }
            }
            Command::Water => describe(
                store::blocking(|| self.water.increment(local.date()))
                    .map(|glasses| format!("Logged! {glasses} glass(es) of water today.")),
            ),
            Command::DebugFlows => describe(
                store::blocking(|| self.debug.reset_all_flows()).map(|_| "Daily flows reset."),
            ),
            Command::DebugCounters => describe(
                store::blocking(|| self.debug.reset_counters())
                    .map(|removed| format!("Removed {removed} counter entries.")),
            ),
            Command::DebugHistory(kind) => describe(
                self.clear_history(kind)
                    .await
                    .map(|_| format!("Cleared {} history.", kind.as_str())),
            ),
            Command::Help => HELP.to_string(),
            Command::Unknown(raw) => format!("I don't know {raw}. {HELP}"),
        }
    }

    /// A fired daily flow becomes a pending check-in; an older unanswered
    /// one is cancelled.
    fn offer_check_in(&mut self, flow: FlowKind, now: DateTime<Utc>) {
        if self.check_in.phase().is_live() {
            if let Err(err) = self.check_in.cancel(now) {
                crate::log_warn!("Could not cancel stale check-in: {err}");
            }
        }
        if let Err(err) = self.check_in.offer(Some(flow.as_str().to_string()), now) {
            crate::log_warn!("Could not offer {} check-in: {err}", flow.as_str());
            return;
        }
        self.pending_flow = Some(flow);
        self.save_check_ins();
    }

    fn save_check_ins(&self) {
        let saved =
            store::blocking(|| self.check_in.history().save(self.store.as_ref(), SessionKind::CheckIn));
        if let Err(err) = saved {
            crate::log_error!("Failed to persist check-in history: {err:#}");
        }
    }

    fn answer_check_in(&mut self, text: &str, now: DateTime<Utc>) -> Option<String> {
        if self.check_in.phase() != SessionPhase::Offered {
            return None;
        }
        let affirmative = match detect_intent(text) {
            Some(Intent::Confirmation) => Some(true),
            Some(Intent::Decline) | Some(Intent::Struggle) => Some(false),
            _ => None,
        };
        let flow = self.pending_flow;
        let outcome = match self.check_in.reply(affirmative) {
            Ok(outcome) => outcome,
            Err(err) => {
                crate::log_warn!("Check-in reply rejected: {err}");
                return None;
            }
        };
        let reply = match outcome {
            ReplyOutcome::Confirmed => {
                let delivered = self.check_in.deliver(None, None, now).map(|_| ());
                if let Err(err) = delivered.and_then(|()| self.check_in.complete(now).map(|_| ())) {
                    crate::log_warn!("Could not complete check-in: {err}");
                }
                self.pending_flow = None;
                crate::log_info!("Check-in accepted");
                flow.map(follow_up).unwrap_or("Great, let's go.")
            }
            ReplyOutcome::Declined => {
                self.pending_flow = None;
                "No worries, we can skip it today."
            }
            ReplyOutcome::Ignored => return None,
        };
        self.save_check_ins();
        Some(reply.to_string())
    }

    async fn chat(&mut self, text: &str, now: DateTime<Utc>) -> Vec<String> {
        let mut replies = Vec::new();

        if let Some(reply) = self.answer_check_in(text, now) {
            replies.push(reply);
            return replies;
        }

        if let Some(signal) = FocusCapability::observe(&self.focus, text).await {
            let snapshot = FocusCapability::snapshot(&self.focus).await;
            match self.focus.break_suggestion(&snapshot, now) {
                Some(BreakSuggestion::Stop) => replies.push(
                    "That sounds painful. Let's stop here and take care of yourself.".to_string(),
                ),
                Some(BreakSuggestion::Rest { minutes }) => {
                    replies.push(format!("You sound tired. How about a {minutes}-minute break?"))
                }
                None => crate::log_debug!("Noted {} signal", signal.kind.as_str()),
            }
        }

        if let Some(reply) = self.humor.handle_message(text, now) {
            if let Err(err) = store::blocking(|| self.humor.save_history(self.store.as_ref())) {
                crate::log_error!("Failed to persist humor history: {err:#}");
            }
            replies.push(match reply {
                HumorReply::Joke(joke) => joke,
                HumorReply::Declined => "No problem, maybe later.".to_string(),
                HumorReply::Backoff => {
                    "That sounds hard. I'm here if you want to talk it through.".to_string()
                }
            });
            return replies;
        }

        if let Some(reply) = self.game.handle_message(text, now) {
            if let Err(err) = store::blocking(|| self.game.save_history(self.store.as_ref())) {
                crate::log_error!("Failed to persist game history: {err:#}");
            }
            replies.push(match reply {
                GameReply::Prompt(prompt) => prompt.to_string(),
                GameReply::Declined => "Okay, another time.".to_string(),
                GameReply::Played {
                    user,
                    companion,
                    outcome,
                } => {
                    let verdict = match outcome {
                        RoundOutcome::Win => "You win!",
                        RoundOutcome::Lose => "I win!",
                        RoundOutcome::Draw => "It's a draw!",
                    };
                    format!("You threw {}, I threw {}. {verdict}", user.as_str(), companion.as_str())
                }
            });
        }

        if replies.is_empty() && self.focus().snapshot().await.phase == SessionPhase::Idle {
            if let Some(offer) = self.humor.try_offer(now) {
                replies.push(offer.to_string());
            }
        }
        replies
    }

    /// Clears archived sessions for `kind` in memory and in the store.
    pub async fn clear_history(&mut self, kind: SessionKind) -> Result<()> {
        match kind {
            SessionKind::Focus => self.focus().clear_history().await?,
            SessionKind::Humor => self.humor.machine_mut().history_mut().clear(),
            SessionKind::Game => self.game.machine_mut().history_mut().clear(),
            SessionKind::CheckIn => self.check_in.history_mut().clear(),
        }
        store::blocking(|| self.debug.clear_history(kind))
    }

    pub fn water_today(&self, local: NaiveDateTime) -> u32 {
        self.water.get(local.date())
    }

    pub fn eligible_flow(&self, local: NaiveDateTime) -> Option<FlowKind> {
        self.gate.eligible(local)
    }

    pub async fn shutdown(&self) {
        self.focus().clear_ticker().await;
    }
}

fn follow_up(flow: FlowKind) -> &'static str {
    match flow {
        FlowKind::MorningBriefing => "What's the one thing you want to get done today?",
        FlowKind::EveningReflection => "What went well today, even if it was small?",
        FlowKind::WindDown => "Let's put the screens away soon. What's one thing you're grateful for?",
    }
}

fn describe<T: Into<String>>(result: Result<T>) -> String {
    match result {
        Ok(text) => text.into(),
        Err(err) => {
            crate::log_warn!("Command rejected: {err}");
            format!("Can't do that right now: {err}")
        }
    }
}
