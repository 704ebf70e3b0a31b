//! Terminal UI layer for the DvLIR energy dashboard.
//!
//! Provides themes, the header and value-box components, the readings and
//! calculated tables, and the main application event loop built on top of
//! [`ratatui`].

pub mod app;
pub mod components;
pub mod table_view;
pub mod themes;

pub use meter_core as core;
