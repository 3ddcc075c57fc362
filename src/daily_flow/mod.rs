pub mod counters;
pub mod debug;
pub mod gate;

pub use counters::DailyCounter;
pub use debug::DebugController;
pub use gate::{eligible_flow, DailyFlowGate, FlowKind, FlowWindow};
