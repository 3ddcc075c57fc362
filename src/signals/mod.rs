//! Deterministic text classifiers backed by priority-ordered rule tables.

pub mod focus;
pub mod intent;
pub mod rules;

pub use focus::detect_focus_signal;
pub use intent::{detect_intent, is_struggle, GameMove, Intent};
pub use rules::{Rule, RuleTable};
