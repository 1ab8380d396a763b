//! maintkit library crate
//!
//! This crate provides both a CLI binary and a library API for programmatic use

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod log_sink;
pub mod maintenance;
pub mod privilege;
pub mod process;
pub mod progress;
pub mod spinner;
pub mod theme;
pub mod tui;
pub mod ui_channel;
