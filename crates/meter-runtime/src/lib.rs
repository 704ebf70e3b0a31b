//! Session orchestration for the DvLIR dashboard.
//!
//! Holds the per-session state and decides which derived entities need to be
//! rebuilt when the user changes an input.

pub mod output;
pub mod session;

pub use meter_core as core;
pub use meter_data as data;
