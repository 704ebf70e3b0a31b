//! Reusable dashboard widgets.

pub mod header;
pub mod value_box;
