//! Position sizing and aggregate risk control.

pub mod manager;
pub mod sizer;

pub use manager::{EntryGate, Rejection, RiskManager};
pub use sizer::{PositionSizer, SizeDecision};
