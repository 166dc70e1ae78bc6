//! Command-line interface components
//!
//! Argument parsing and the command handlers of the `catalog-crawler` binary.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, RunArgs};
pub use commands::{handle_config, handle_run};
