//! Incremental CI console log viewer: polls a build console, folds the log
//! into typed sections and renders them in the terminal.

pub mod api;
pub mod app;
pub mod config;
pub mod console;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod types;
pub mod ui;
pub mod util;

#[cfg(test)]
mod test_support;
