//! Indicators used by the strategy.

pub mod atr;

pub use atr::{true_range, wilder_smooth, Atr};
