//! The `qgate` command line tool.
//!
//! Loads a gate configuration, evaluates its checks against a JSON document and prints
//! the report. A failing verdict surfaces as an error, so the process exits non-zero.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use qgate_lib::{Host, run};
use std::io::Write;
use std::io::{stderr, stdout};

/// Sends reports to stdout and validation diagnostics to stderr.
#[derive(Debug, Clone, Default)]
pub struct ProcessHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for ProcessHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[tokio::main]
#[cfg_attr(coverage_nightly, coverage(off))]
async fn main() -> Result<(), ohno::AppError> {
    run(&mut ProcessHost, std::env::args()).await
}
