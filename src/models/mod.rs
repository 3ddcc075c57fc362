mod session;
mod signal;

pub use session::{InteractionSession, SessionKind, SessionPhase};
pub use signal::{SignalEvent, SignalKind};
