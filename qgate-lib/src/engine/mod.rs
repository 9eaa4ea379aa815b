//! Declarative condition evaluation using JSONPath and CEL
//!
//! This module implements the rule interpreter behind every quality gate. A check
//! selects values from a JSON document with a JSONPath reference, runs a user-authored
//! condition against them in a sandboxed CEL environment, and maps the boolean outcome
//! to a status. Several check statuses can then be combined into one tri-state verdict.
//!
//! # Implementation Model
//!
//! Components, leaves first:
//!
//! 1. [`path`] resolves JSONPath expressions against a document
//! 2. [`sandbox`] runs one CEL expression in a fresh context on a worker thread with a
//!    hard timeout
//! 3. [`condition`] binds a reference set into the sandbox and runs a condition that
//!    contains exactly one `$` reference token
//! 4. [`quantifier`] implements `all`, `any`, `one` and `none` over collections
//! 5. [`check`] orchestrates a whole check, including empty and not-found policy,
//!    status mapping and reason-context trimming
//! 6. [`concat`] folds named check statuses into a single `GREEN`/`YELLOW`/`RED`
//! 7. [`gate`] evaluates a whole set of checks concurrently
//!
//! Every evaluation is self-contained. The only configuration is [`EngineConfig`],
//! which is passed explicitly through [`Engine`] to every component that needs it.

pub mod check;
pub mod concat;
pub mod condition;
mod error;
pub mod gate;
pub mod path;
pub mod quantifier;
mod reference;
pub mod sandbox;
mod status;
mod value;

use core::time::Duration;
use std::time::Instant;

pub use check::{CheckDefinition, CheckOptions, CheckResult, ReasonPackage};
pub use concat::ConcatenationResult;
pub use error::EvalError;
pub use gate::{CheckOutcome, CheckReport, ErrorPolicy, Gate, GateReport, NamedCheck};
pub use quantifier::{Quantifier, QuantifierOutcome};
pub use status::{Signal, Status};
pub use value::ValueExt;

/// Default wall-clock budget for a single sandboxed evaluation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings shared by every evaluation performed through an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// When true, quantifiers keep examining elements after a failure so that every
    /// failing element is reported. When false they return at the first failure.
    pub continue_search_on_fail: bool,

    /// Maximum time a single sandboxed expression may run.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continue_search_on_fail: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Entry point for condition, check and concatenation evaluation.
///
/// The engine holds its configuration and, while it serves an enclosing quantified
/// evaluation, the deadline of that evaluation. It is cheap to copy and safe to share
/// between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    config: EngineConfig,
    deadline: Option<Instant>,
}

impl Engine {
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self { config, deadline: None }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bounds all further work of this engine copy by `deadline`. An earlier deadline
    /// already in place is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |current| current.min(deadline)));
        self
    }

    #[must_use]
    pub const fn sandbox(&self) -> sandbox::Sandbox {
        sandbox::Sandbox::new(self.config.timeout).with_deadline(self.deadline)
    }

    /// Fails with [`EvalError::Timeout`] once the deadline has passed.
    pub(crate) fn ensure_time_left(&self, expression: &str) -> Result<(), EvalError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EvalError::Timeout {
                expression: expression.to_string(),
                timeout: self.config.timeout,
            }),
            _ => Ok(()),
        }
    }
}
