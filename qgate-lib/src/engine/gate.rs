//! Batch evaluation of a check set
//!
//! A gate evaluates every check of a set against one document, optionally folds the
//! resulting statuses through a concatenation expression, and derives an overall
//! verdict. Checks are independent of each other, so they run concurrently on the
//! blocking pool. Results are always reported in definition order.

use super::check::{CheckDefinition, CheckResult};
use super::concat::ConcatenationResult;
use super::{Engine, EvalError, Signal, Status};
use clap::ValueEnum;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;

const LOG_TARGET: &str = "      gate";

/// What to do when a check cannot be evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop at the first failing check
    #[default]
    Abort,

    /// Record the failure and keep evaluating the remaining checks
    Report,
}

/// A check definition together with the name concatenations refer to it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCheck {
    pub name: String,
    pub definition: CheckDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CheckOutcome {
    Evaluated(CheckResult),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub name: String,

    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

impl CheckReport {
    /// The tri-state value this check contributes to the verdict, if any.
    #[must_use]
    pub fn signal(&self) -> Option<Signal> {
        match &self.outcome {
            CheckOutcome::Evaluated(result) => result.status.signal(),
            CheckOutcome::Failed { .. } => Some(Signal::Red),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub checks: Vec<CheckReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concatenation: Option<ConcatenationResult>,

    pub verdict: Status,
}

impl GateReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckReport> {
        self.checks.iter().filter(|c| matches!(c.outcome, CheckOutcome::Failed { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct Gate {
    engine: Engine,
    checks: Vec<NamedCheck>,
    concatenation: Option<String>,
    error_policy: ErrorPolicy,
}

impl Gate {
    #[must_use]
    pub const fn new(engine: Engine, checks: Vec<NamedCheck>) -> Self {
        Self {
            engine,
            checks,
            concatenation: None,
            error_policy: ErrorPolicy::Abort,
        }
    }

    #[must_use]
    pub fn with_concatenation(mut self, concatenation: impl Into<String>) -> Self {
        self.concatenation = Some(concatenation.into());
        self
    }

    #[must_use]
    pub const fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    #[must_use]
    pub fn checks(&self) -> &[NamedCheck] {
        &self.checks
    }

    /// Evaluates every check against `document`.
    ///
    /// # Errors
    ///
    /// With [`ErrorPolicy::Abort`], the error of the first failing check in definition
    /// order. With either policy, any error raised by the concatenation.
    pub async fn evaluate(&self, document: Arc<Value>) -> Result<GateReport, EvalError> {
        let start_time = Instant::now();
        log::info!(target: LOG_TARGET, "Evaluating {} check(s)", self.checks.len());

        let num_workers = std::thread::available_parallelism().map(core::num::NonZero::get).unwrap_or(4);
        let semaphore = Arc::new(Semaphore::new(num_workers));

        let tasks = self.checks.iter().map(|check| {
            let engine = self.engine;
            let definition = check.definition.clone();
            let document = Arc::clone(&document);
            let semaphore = Arc::clone(&semaphore);

            async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                spawn_blocking(move || engine.run_check(&definition, &document))
                    .await
                    .expect("tasks must not panic")
            }
        });

        let results = join_all(tasks).await;

        let mut checks = Vec::with_capacity(results.len());
        let mut registry = HashMap::with_capacity(results.len());

        for (check, result) in self.checks.iter().zip(results) {
            let outcome = match result {
                Ok(result) => {
                    log::debug!(target: LOG_TARGET, "Check '{}' finished with {}", check.name, result.status);
                    let _ = registry.insert(check.name.clone(), result.clone());
                    CheckOutcome::Evaluated(result)
                }
                Err(e) if self.error_policy == ErrorPolicy::Report => {
                    log::warn!(target: LOG_TARGET, "Check '{}' failed: {e}", check.name);
                    CheckOutcome::Failed { error: e.to_string() }
                }
                Err(e) => return Err(e),
            };

            checks.push(CheckReport {
                name: check.name.clone(),
                outcome,
            });
        }

        let concatenation = self
            .concatenation
            .as_deref()
            .map(|condition| self.engine.eval_concatenation(condition, &registry))
            .transpose()?;

        let verdict = concatenation.as_ref().map_or_else(
            || Status::from(checks.iter().filter_map(CheckReport::signal).min().unwrap_or(Signal::Green)),
            |c| c.status.clone(),
        );

        log::info!(target: LOG_TARGET, "Verdict {verdict} reached in {:.3}s", start_time.elapsed().as_secs_f64());

        Ok(GateReport {
            checks,
            concatenation,
            verdict,
        })
    }
}
