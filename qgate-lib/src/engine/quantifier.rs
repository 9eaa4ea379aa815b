//! Quantified predicates over collections
//!
//! Each quantifier applies a single condition to every element of a collection, in
//! order, and aggregates the outcomes:
//!
//! - `all`: every element must be present and satisfy the condition
//! - `any`: at least one present element must satisfy the condition
//! - `one`: exactly one present element must satisfy the condition
//! - `none`: no present element may satisfy the condition
//!
//! An element is present when it is truthy (see [`ValueExt::is_truthy`]). The
//! [`EngineConfig::continue_search_on_fail`](super::EngineConfig) setting decides
//! whether `all`, `one` and `none` stop at the first failure or keep going so that every
//! failing element is reported. `any` always stops at its first match.
//!
//! Inside a check condition the quantifiers are callable as CEL functions taking the
//! collection and the element condition, e.g. `all(ref, '$.status == "ok"')`.

use super::check::ReasonPackage;
use super::sandbox::{Bindings, Extension};
use super::{Engine, EvalError, ValueExt, sandbox};
use cel_interpreter::{Context, ExecutionError, Value as CelValue};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Instant;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

const LOG_TARGET: &str = "quantifier";

/// Binding that holds the check's resolved reference set in quantified conditions.
pub const REFERENCE_BINDING: &str = "ref";

static CALL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|[^.\w])(?:all|any|one|none)\s*\(").expect("invalid regex"));

static ELEMENT_CONDITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^.\w])(?:all|any|one|none)\s*\(\s*[^,]*,\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#).expect("invalid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Quantifier {
    All,
    Any,
    One,
    None,
}

/// The aggregate result of a quantifier.
///
/// `reason_packages` is `None` when the quantifier succeeded with nothing to report,
/// which is distinct from an empty list of packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantifierOutcome {
    pub result: bool,

    #[serde(rename = "reasonPackage", skip_serializing_if = "Option::is_none")]
    pub reason_packages: Option<Vec<ReasonPackage>>,
}

impl QuantifierOutcome {
    const fn new(result: bool, reason_packages: Option<Vec<ReasonPackage>>) -> Self {
        Self { result, reason_packages }
    }
}

/// Whether a condition calls one of the quantifier functions.
#[must_use]
pub fn is_quantified(condition: &str) -> bool {
    CALL_REGEX.is_match(condition)
}

/// The string-literal element conditions passed to quantifier calls in `condition`.
///
/// Conditions built at evaluation time rather than written as literals are not returned.
#[must_use]
pub fn element_conditions(condition: &str) -> Vec<String> {
    ELEMENT_CONDITION_REGEX
        .captures_iter(condition)
        .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
        .map(|literal| unescape(literal.as_str()))
        .collect()
}

fn unescape(literal: &str) -> String {
    let mut unescaped = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                unescaped.push(next);
            }
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

impl Engine {
    pub fn quantify(&self, quantifier: Quantifier, items: &[Value], condition: &str) -> Result<QuantifierOutcome, EvalError> {
        match quantifier {
            Quantifier::All => self.all(items, condition),
            Quantifier::Any => self.any(items, condition),
            Quantifier::One => self.one(items, condition),
            Quantifier::None => self.none(items, condition),
        }
    }

    pub fn all(&self, items: &[Value], condition: &str) -> Result<QuantifierOutcome, EvalError> {
        let exhaustive = self.config().continue_search_on_fail;
        let mut failures = Vec::new();

        for element in items {
            self.ensure_time_left(condition)?;
            let failure = if element.is_truthy() {
                let outcome = self.evaluate_condition(element, condition)?;
                if outcome.result {
                    continue;
                }
                ReasonPackage::new(Value::Array(outcome.values), element.clone())
            } else {
                ReasonPackage::new(element.clone(), element.clone())
            };

            failures.push(failure);
            if !exhaustive {
                return Ok(QuantifierOutcome::new(false, Some(failures)));
            }
        }

        if failures.is_empty() {
            Ok(QuantifierOutcome::new(true, None))
        } else {
            Ok(QuantifierOutcome::new(false, Some(failures)))
        }
    }

    pub fn any(&self, items: &[Value], condition: &str) -> Result<QuantifierOutcome, EvalError> {
        let mut examined = Vec::new();

        for element in items.iter().filter(|e| e.is_truthy()) {
            self.ensure_time_left(condition)?;
            let outcome = self.evaluate_condition(element, condition)?;
            examined.push(ReasonPackage::new(Value::Array(outcome.values), element.clone()));
            if outcome.result {
                return Ok(QuantifierOutcome::new(true, Some(examined)));
            }
        }

        Ok(QuantifierOutcome::new(false, Some(examined)))
    }

    pub fn one(&self, items: &[Value], condition: &str) -> Result<QuantifierOutcome, EvalError> {
        let exhaustive = self.config().continue_search_on_fail;
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for element in items {
            self.ensure_time_left(condition)?;
            if !element.is_truthy() {
                invalid.push(ReasonPackage::new(element.clone(), element.clone()));
                continue;
            }

            let outcome = self.evaluate_condition(element, condition)?;
            let package = ReasonPackage::new(Value::Array(outcome.values), element.clone());
            if outcome.result {
                valid.push(package);
                if valid.len() > 1 && !exhaustive {
                    return Ok(QuantifierOutcome::new(false, Some(valid)));
                }
            } else {
                invalid.push(package);
            }
        }

        Ok(match valid.len() {
            0 => QuantifierOutcome::new(false, Some(invalid)),
            1 => QuantifierOutcome::new(true, Some(valid)),
            _ => QuantifierOutcome::new(false, Some(valid)),
        })
    }

    pub fn none(&self, items: &[Value], condition: &str) -> Result<QuantifierOutcome, EvalError> {
        let exhaustive = self.config().continue_search_on_fail;
        let mut invalid = Vec::new();

        for element in items.iter().filter(|e| e.is_truthy()) {
            self.ensure_time_left(condition)?;
            let outcome = self.evaluate_condition(element, condition)?;
            if outcome.result {
                invalid.push(ReasonPackage::new(Value::Array(outcome.values), element.clone()));
                if !exhaustive {
                    return Ok(QuantifierOutcome::new(false, Some(invalid)));
                }
            }
        }

        if invalid.is_empty() {
            Ok(QuantifierOutcome::new(true, None))
        } else {
            Ok(QuantifierOutcome::new(false, Some(invalid)))
        }
    }

    /// Runs a quantified condition in the sandbox with `reference` bound as `ref`.
    ///
    /// The returned reason packages are those of the last quantifier call the
    /// expression made. An error raised inside any quantifier call is returned as is,
    /// even if the surrounding expression could have recovered from it.
    ///
    /// The whole evaluation, including every element condition the quantifiers run,
    /// shares one time budget. Once it is spent, quantifiers stop before their next
    /// element, so an abandoned evaluation winds down instead of finishing its collection.
    pub fn evaluate_quantified(&self, reference: Vec<Value>, condition: &str) -> Result<QuantifierOutcome, EvalError> {
        let engine = Instant::now()
            .checked_add(self.config().timeout)
            .map_or(*self, |deadline| self.with_deadline(deadline));

        let scope = QuantifierScope {
            engine,
            journal: Arc::default(),
        };
        let journal = Arc::clone(&scope.journal);

        let bindings = Bindings::new()
            .with_variable(REFERENCE_BINDING, Value::Array(reference))
            .with_extension(scope);
        let result = engine.sandbox().run(condition, bindings);

        let journal = core::mem::take(&mut *journal.lock().unwrap_or_else(PoisonError::into_inner));
        if let Some(error) = journal.error {
            return Err(error);
        }

        let result = result?.is_truthy();
        log::debug!(target: LOG_TARGET, "'{condition}' evaluated to {result}");

        Ok(QuantifierOutcome::new(result, journal.last.and_then(|outcome| outcome.reason_packages)))
    }
}

/// What the quantifier calls of one expression produced.
#[derive(Debug, Default)]
struct Journal {
    last: Option<QuantifierOutcome>,
    error: Option<EvalError>,
}

/// Installs the four quantifiers as CEL functions for a single sandbox run.
#[derive(Debug, Clone)]
struct QuantifierScope {
    engine: Engine,
    journal: Arc<Mutex<Journal>>,
}

impl QuantifierScope {
    fn invoke(&self, quantifier: Quantifier, items: &CelValue, condition: &str) -> Result<bool, ExecutionError> {
        let name: &'static str = quantifier.into();

        let items = match sandbox::from_cel(items) {
            Some(Value::Array(items)) => items,
            _ => return Err(ExecutionError::function_error(name, "expects a list as its first argument")),
        };

        let outcome = self.engine.quantify(quantifier, &items, condition);
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(outcome) => {
                let result = outcome.result;
                journal.last = Some(outcome);
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                let _ = journal.error.get_or_insert(e);
                Err(ExecutionError::function_error(name, message.as_str()))
            }
        }
    }
}

impl Extension for QuantifierScope {
    fn install(&self, context: &mut Context<'_>) {
        for quantifier in Quantifier::iter() {
            let scope = self.clone();
            let name: &'static str = quantifier.into();
            context.add_function(name, move |items: CelValue, condition: Arc<String>| {
                scope.invoke(quantifier, &items, &condition)
            });
        }
    }
}
