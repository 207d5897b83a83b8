//! CLI command implementations
//!
//! Each subcommand has its own module with the implementation logic.

pub mod config;
pub mod once;
pub mod run;
