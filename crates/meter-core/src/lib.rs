//! Domain types shared by the DvLIR dashboard crates.
//!
//! Holds the reading and aggregation models, the error enum, number and
//! timestamp formatting, and the command-line settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{MeterError, Result};
