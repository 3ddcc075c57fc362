use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use crate::{
    models::{SessionKind, SessionPhase},
    signals::{detect_intent, GameMove, Intent},
    store::KeyValueStore,
};

use super::{
    history::SessionHistory,
    state::{MachineConfig, ReplyOutcome, SessionMachine},
};

pub const GAME_PROMPT: &str = "Rock, paper, scissors... shoot!";
const OFFER_PROMPT: &str = "Quick round of rock, paper, scissors?";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RoundOutcome {
    Win,
    Lose,
    Draw,
}

/// Outcome from the user's point of view.
pub fn resolve(user: GameMove, companion: GameMove) -> RoundOutcome {
    if user == companion {
        RoundOutcome::Draw
    } else if user.beats(companion) {
        RoundOutcome::Win
    } else {
        RoundOutcome::Lose
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameReply {
    Prompt(&'static str),
    Declined,
    Played {
        user: GameMove,
        companion: GameMove,
        outcome: RoundOutcome,
    },
}

/// Rock-paper-scissors rounds driven by the shared session machine.
pub struct GameRound {
    machine: SessionMachine,
}

impl GameRound {
    pub fn new(cooldown: Duration, history: SessionHistory) -> Self {
        let config = MachineConfig {
            cooldown,
            ..MachineConfig::default()
        };
        Self {
            machine: SessionMachine::with_history(SessionKind::Game, config, history),
        }
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SessionMachine {
        &mut self.machine
    }

    pub fn save_history(&self, store: &dyn KeyValueStore) -> Result<()> {
        self.machine.history().save(store, SessionKind::Game)
    }

    pub fn try_offer(&mut self, now: DateTime<Utc>) -> Option<&'static str> {
        self.machine.offer(None, now).ok().map(|_| OFFER_PROMPT)
    }

    pub fn handle_message(&mut self, text: &str, now: DateTime<Utc>) -> Option<GameReply> {
        self.handle_message_with(text, now, &mut rand::thread_rng())
    }

    pub fn handle_message_with<R: Rng>(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<GameReply> {
        let intent = detect_intent(text);

        match (self.machine.phase(), intent) {
            (_, Some(Intent::Struggle)) if self.machine.phase().is_live() => {
                self.machine.cancel(now).ok()?;
                None
            }
            (SessionPhase::Offered, _) => {
                let affirmative = match intent {
                    Some(Intent::Confirmation) | Some(Intent::GameRequest) => Some(true),
                    Some(Intent::Decline) => Some(false),
                    _ => None,
                };
                match self.machine.reply(affirmative).ok()? {
                    ReplyOutcome::Confirmed => {
                        self.machine
                            .deliver(Some(GAME_PROMPT.into()), None, now)
                            .ok()?;
                        Some(GameReply::Prompt(GAME_PROMPT))
                    }
                    ReplyOutcome::Declined => Some(GameReply::Declined),
                    ReplyOutcome::Ignored => None,
                }
            }
            (SessionPhase::Active, Some(Intent::GameMove(user))) => {
                let companion = GameMove::ALL[rng.gen_range(0..GameMove::ALL.len())];
                let outcome = resolve(user, companion);
                self.machine.complete(now).ok()?;
                Some(GameReply::Played {
                    user,
                    companion,
                    outcome,
                })
            }
            (SessionPhase::Active, Some(Intent::Decline)) => {
                self.machine.cancel(now).ok()?;
                Some(GameReply::Declined)
            }
            (phase, Some(Intent::GameRequest)) if !phase.is_live() => {
                self.machine
                    .start(Some(GAME_PROMPT.into()), None, now)
                    .ok()?;
                Some(GameReply::Prompt(GAME_PROMPT))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    fn at(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 18, m, 0).unwrap()
    }

    fn game() -> GameRound {
        GameRound::new(Duration::minutes(5), SessionHistory::new(50))
    }

    #[test]
    fn resolution_table() {
        assert_eq!(resolve(GameMove::Rock, GameMove::Scissors), RoundOutcome::Win);
        assert_eq!(resolve(GameMove::Rock, GameMove::Paper), RoundOutcome::Lose);
        assert_eq!(resolve(GameMove::Paper, GameMove::Paper), RoundOutcome::Draw);
    }

    #[test]
    fn offered_round_plays_to_completion() {
        let mut game = game();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(game.try_offer(at(0)).is_some());
        assert_eq!(
            game.handle_message_with("sure", at(0), &mut rng),
            Some(GameReply::Prompt(GAME_PROMPT))
        );

        match game.handle_message_with("paper", at(1), &mut rng) {
            Some(GameReply::Played {
                user,
                companion,
                outcome,
            }) => {
                assert_eq!(user, GameMove::Paper);
                assert_eq!(outcome, resolve(user, companion));
            }
            other => panic!("expected a played round, got {other:?}"),
        }
        assert_eq!(game.machine().phase(), SessionPhase::Idle);
        assert_eq!(game.machine().history().len(), 1);
    }

    #[test]
    fn moves_outside_a_round_are_ignored() {
        let mut game = game();
        assert_eq!(game.handle_message("rock", at(0)), None);
        assert_eq!(game.machine().phase(), SessionPhase::Idle);
    }

    #[test]
    fn direct_request_starts_a_round() {
        let mut game = game();
        assert_eq!(
            game.handle_message("let's play", at(0)),
            Some(GameReply::Prompt(GAME_PROMPT))
        );
        assert_eq!(game.machine().phase(), SessionPhase::Active);
        assert_eq!(game.handle_message("nope", at(0)), Some(GameReply::Declined));
        assert_eq!(
            game.machine().history().latest().map(|s| s.phase),
            Some(SessionPhase::Cancelled)
        );
    }

    #[test]
    fn declined_offer_waits_out_the_cooldown() {
        let mut game = game();
        game.try_offer(at(0)).unwrap();
        assert_eq!(game.handle_message("no thanks", at(0)), Some(GameReply::Declined));
        assert!(game.try_offer(at(4)).is_none());
        assert!(game.try_offer(at(5)).is_some());
    }
}
