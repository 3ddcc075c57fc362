pub mod controller;
pub mod game;
pub mod history;
pub mod humor;
pub mod rhythm;
pub mod state;

pub use controller::{FocusController, FocusEvent, FocusSnapshot};
pub use game::{GameReply, GameRound, RoundOutcome};
pub use history::{history_key, SessionHistory, DEFAULT_HISTORY_CAP};
pub use humor::{HumorCompanion, HumorReply};
pub use rhythm::{BreakSuggestion, FocusCapability, RhythmAwareFocus, RhythmProfile};
pub use state::{MachineConfig, ReplyOutcome, SessionMachine, TransitionError};
