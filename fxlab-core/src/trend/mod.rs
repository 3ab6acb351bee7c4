//! Market bias from mitigation-level breaks.

pub mod tracker;

pub use tracker::{Bias, TrendState, TrendTracker};
