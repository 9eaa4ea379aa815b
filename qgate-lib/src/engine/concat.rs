//! Tri-state aggregation of check statuses
//!
//! A concatenation is a boolean expression over check names, e.g.
//! `build && (coverage || docs)`. Each name is replaced by the status of that check and
//! the result is folded into a single `GREEN`, `YELLOW` or `RED` using two boolean passes:
//!
//! 1. `GREEN` and `YELLOW` are true, `RED` is false. A false result means a `RED` was
//!    decisive, so the aggregate is `RED`.
//! 2. Only `GREEN` is true. A false result now means a `YELLOW` was decisive, so the
//!    aggregate is `YELLOW`. Otherwise it is `GREEN`.

use super::check::CheckResult;
use super::sandbox::Bindings;
use super::{Engine, EvalError, Signal, Status, ValueExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

const LOG_TARGET: &str = "    concat";

static OPERATOR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&&|\|\|").expect("invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatenationResult {
    pub condition: String,
    pub status: Status,
}

impl Engine {
    /// Aggregates the statuses of the checks named in `condition`.
    ///
    /// # Errors
    ///
    /// [`EvalError::UnknownCheck`] when a name is not in `checks`,
    /// [`EvalError::UnsupportedStatus`] when a named check's status is not tri-state, and
    /// any sandbox error raised while evaluating the substituted expression.
    pub fn eval_concatenation(&self, condition: &str, checks: &HashMap<String, CheckResult>) -> Result<ConcatenationResult, EvalError> {
        let mut expression = String::with_capacity(condition.len());

        let operators = OPERATOR_REGEX.find_iter(condition).map(|m| m.as_str());
        for (segment, operator) in OPERATOR_REGEX.split(condition).zip(operators.map(Some).chain([None])) {
            let name = check_name(segment);

            let check = checks.get(name).ok_or_else(|| EvalError::UnknownCheck { name: name.to_string() })?;
            let signal = check.status.signal().ok_or_else(|| EvalError::UnsupportedStatus {
                name: name.to_string(),
                status: check.status.to_string(),
            })?;

            let literal: &'static str = signal.into();
            expression.push_str(&segment.replacen(name, literal, 1));
            if let Some(operator) = operator {
                expression.push_str(operator);
            }
        }

        log::debug!(target: LOG_TARGET, "'{condition}' expanded to '{expression}'");

        Ok(ConcatenationResult {
            condition: condition.to_string(),
            status: self.evaluate_concatenation_condition(&expression)?,
        })
    }

    /// Folds an expression over the literals `GREEN`, `YELLOW` and `RED` into one status.
    pub fn evaluate_concatenation_condition(&self, expression: &str) -> Result<Status, EvalError> {
        let sandbox = self.sandbox();

        let tolerant = signal_bindings(|signal| signal != Signal::Red);
        if !sandbox.run(expression, tolerant)?.is_truthy() {
            return Ok(Status::RED);
        }

        let strict = signal_bindings(|signal| signal == Signal::Green);
        if !sandbox.run(expression, strict)?.is_truthy() {
            return Ok(Status::YELLOW);
        }

        Ok(Status::GREEN)
    }
}

/// Names of the checks a concatenation refers to, in order of appearance.
pub fn referenced_checks(condition: &str) -> impl Iterator<Item = &str> {
    OPERATOR_REGEX.split(condition).map(check_name)
}

fn check_name(segment: &str) -> &str {
    segment.trim_matches(|c: char| c.is_whitespace() || c == '(' || c == ')')
}

fn signal_bindings(truth: impl Fn(Signal) -> bool) -> Bindings {
    [Signal::Green, Signal::Yellow, Signal::Red]
        .into_iter()
        .fold(Bindings::new(), |bindings, signal| {
            let name: &'static str = signal.into();
            bindings.with_variable(name, Value::Bool(truth(signal)))
        })
}
