use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::rules::RuleTable;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameMove {
    Rock,
    Paper,
    Scissors,
}

impl GameMove {
    pub const ALL: [GameMove; 3] = [GameMove::Rock, GameMove::Paper, GameMove::Scissors];

    pub fn beats(&self, other: GameMove) -> bool {
        matches!(
            (self, other),
            (GameMove::Rock, GameMove::Scissors)
                | (GameMove::Paper, GameMove::Rock)
                | (GameMove::Scissors, GameMove::Paper)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMove::Rock => "rock",
            GameMove::Paper => "paper",
            GameMove::Scissors => "scissors",
        }
    }
}

/// Conversational intent of a free-text user message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    /// The user is having a hard time; playful offers must back off.
    Struggle,
    Decline,
    Confirmation,
    JokeRequest,
    GameRequest,
    GameMove(GameMove),
}

static INTENT_RULES: LazyLock<RuleTable<Intent>> = LazyLock::new(|| {
    RuleTable::compile(&[
        (
            "struggle",
            r"\b(overwhelm\w*|struggling|(hard|rough|bad|awful) day|can[’']?t cope|anxious|anxiety|depressed|panic\w*|hopeless|feel(ing)? (awful|terrible|horrible)|not ok(ay)?)\b",
            Intent::Struggle,
        ),
        (
            "decline",
            r"^\s*(no|nope|nah|not now|not really|no thanks|maybe later|later|pass|skip|i[’']?m good)\b",
            Intent::Decline,
        ),
        (
            "confirmation",
            r"^\s*(yes|yeah|yea|yep|yup|sure|ok(ay)?|alright|please|absolutely|definitely|of course|why not|go (for it|ahead)|sounds good|let[’']?s (do it|go))\b",
            Intent::Confirmation,
        ),
        (
            "joke_request",
            r"\b(tell me a joke|another joke|make me laugh|something funny|cheer me up)\b",
            Intent::JokeRequest,
        ),
        (
            "game_request",
            r"\b(play (a game|rock[ ,-]*paper[ ,-]*scissors)|let[’']?s play|wanna play|want to play)\b",
            Intent::GameRequest,
        ),
        ("move_rock", r"^\s*rock\b", Intent::GameMove(GameMove::Rock)),
        ("move_paper", r"^\s*paper\b", Intent::GameMove(GameMove::Paper)),
        (
            "move_scissors",
            r"^\s*scissors?\b",
            Intent::GameMove(GameMove::Scissors),
        ),
    ])
});

pub fn detect_intent(text: &str) -> Option<Intent> {
    INTENT_RULES.classify(text)
}

pub fn is_struggle(text: &str) -> bool {
    detect_intent(text) == Some(Intent::Struggle)
}
