//! Command-line interface and orchestration for qgate
//!
//! This module implements the CLI commands on top of the evaluation engine. It handles
//! argument parsing, configuration management, and report output.
//!
//! # Commands
//!
//! - **evaluate**: Load a configuration and a JSON document, run every check through a
//!   [`Gate`](crate::engine::Gate), print a console summary, optionally write a JSON
//!   report, and fail when the verdict reaches the `--fail-on` level
//! - **init**: Generate a default configuration file with example checks
//! - **validate**: Check configuration file syntax, paths, and conditions
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! appropriate command handler. All output goes through a [`Host`], so commands can be
//! exercised in tests without touching the real process streams.

mod common;
mod config;
mod evaluate;
mod host;
mod init;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use evaluate::{EvaluateArgs, FailOn, evaluate_document};
pub use host::Host;
#[cfg(any(debug_assertions, test))]
pub use host::TestHost;
pub use init::{InitArgs, init_config};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
