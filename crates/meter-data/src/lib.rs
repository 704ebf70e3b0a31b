//! Data pipeline for DvLIR meter exports.
//!
//! Parses semicolon-separated exports, consolidates them into one
//! time-indexed dataset, derives day/night rows and summary values, and
//! writes tables and plots.

pub mod aggregator;
pub mod consolidator;
pub mod export;
pub mod metrics;
pub mod plot;
pub mod reader;

pub use meter_core as core;
