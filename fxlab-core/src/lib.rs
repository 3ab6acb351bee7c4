//! FxLab Core: engine for a trend-following forex scale-in strategy.
//!
//! This crate contains:
//! - Domain types (bars, pairs, positions, trades, equity points)
//! - Trend/mitigation tracker that derives the market bias
//! - News blackout calendar
//! - Position sizer and risk manager with an aggregate emergency stop budget
//! - Bar-by-bar execution simulator and performance aggregator
//! - Bar ingestion, validation, and data providers

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod news;
pub mod risk;
pub mod trend;
