//! Reusable widgets

pub mod progress;
pub mod shortcuts;
