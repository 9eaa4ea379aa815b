//! Whole-check evaluation
//!
//! A check resolves its reference against the document, applies the empty and
//! not-found policies, evaluates its condition (quantified or plain), maps the boolean
//! outcome to a status, and finally trims the context of every reason package so that
//! only the part selected by the `log` option is reported.

use super::condition::PreparedCondition;
use super::quantifier::{self, QuantifierOutcome};
use super::{Engine, EvalError, Status, ValueExt, path, sandbox};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LOG_TARGET: &str = "     check";

/// Status mapping and reporting options of a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckOptions {
    /// Path selecting what to keep of each reason context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,

    #[serde(default, rename = "true", skip_serializing_if = "Option::is_none")]
    pub on_true: Option<Status>,

    #[serde(default, rename = "false", skip_serializing_if = "Option::is_none")]
    pub on_false: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_if_empty: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_if_not_found: Option<Status>,
}

impl CheckOptions {
    #[must_use]
    pub fn status_for(&self, passed: bool) -> Status {
        if passed {
            self.on_true.clone().unwrap_or(Status::GREEN)
        } else {
            self.on_false.clone().unwrap_or(Status::RED)
        }
    }

    #[must_use]
    pub fn empty_status(&self) -> Status {
        self.return_if_empty.clone().unwrap_or(Status::RED)
    }

    #[must_use]
    pub fn not_found_status(&self) -> Status {
        self.return_if_not_found.clone().unwrap_or(Status::RED)
    }
}

/// What a check examines and how it judges it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDefinition {
    pub reference: String,
    pub condition: String,

    #[serde(default)]
    pub options: CheckOptions,
}

impl CheckDefinition {
    #[must_use]
    pub fn new(reference: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            condition: condition.into(),
            options: CheckOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    /// Verifies that every path parses and that the condition compiles, without
    /// touching any document.
    pub fn validate(&self) -> Result<(), EvalError> {
        let _ = path::compile(&self.reference)?;

        if let Some(log) = &self.options.log {
            let _ = path::compile(log)?;
        }

        if quantifier::is_quantified(&self.condition) {
            sandbox::check_syntax(&self.condition)?;
            return quantifier::element_conditions(&self.condition)
                .iter()
                .try_for_each(|condition| validate_condition(condition));
        }

        validate_condition(&self.condition)
    }
}

/// Verifies a plain condition: exactly one reference token with a valid path, and an
/// expression that compiles once the token is rewritten.
fn validate_condition(condition: &str) -> Result<(), EvalError> {
    let prepared = PreparedCondition::new(condition)?;
    let _ = path::compile(prepared.reference.path())?;
    sandbox::check_syntax(&prepared.expression)
}

/// The values an evaluation examined and where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonPackage {
    pub reasons: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ReasonPackage {
    #[must_use]
    pub const fn new(reasons: Value, context: Value) -> Self {
        Self {
            reasons,
            context: Some(context),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub reference: String,
    pub condition: String,
    pub status: Status,

    #[serde(rename = "bool")]
    pub passed: bool,

    pub reason_packages: Vec<ReasonPackage>,
}

impl CheckResult {
    fn short_circuit(reference: &str, condition: &str, status: Status) -> Self {
        Self {
            reference: reference.to_string(),
            condition: condition.to_string(),
            status,
            passed: false,
            reason_packages: Vec::new(),
        }
    }
}

impl Engine {
    /// Evaluates a check definition against `data`.
    pub fn run_check(&self, definition: &CheckDefinition, data: &Value) -> Result<CheckResult, EvalError> {
        self.eval_check(&definition.condition, &definition.reference, data, &definition.options)
    }

    /// Evaluates `condition` over the values `reference` selects from `data`.
    ///
    /// # Errors
    ///
    /// Authoring defects, invalid paths, sandbox failures and timeouts are returned as
    /// errors. An empty or missing reference is reported through the status instead.
    pub fn eval_check(&self, condition: &str, reference: &str, data: &Value, options: &CheckOptions) -> Result<CheckResult, EvalError> {
        let matches = path::resolve(data, reference)?;

        if matches.is_empty() {
            if !path::has_filter(reference) {
                log::debug!(target: LOG_TARGET, "'{reference}' matched nothing");
                return Ok(CheckResult::short_circuit(reference, condition, options.not_found_status()));
            }
            log::warn!(target: LOG_TARGET, "Filter '{reference}' matched nothing, evaluating '{condition}' anyway");
        }

        if let [only] = matches.as_slice()
            && only.is_hollow()
        {
            log::debug!(target: LOG_TARGET, "'{reference}' matched an empty value");
            return Ok(CheckResult::short_circuit(reference, condition, options.empty_status()));
        }

        let (passed, reclassified, packages) = if quantifier::is_quantified(condition) {
            let found = !matches.is_empty();
            let outcome = self.evaluate_quantified(matches, condition)?;
            let status = reclassify(&outcome, found, options);
            (outcome.result, status, outcome.reason_packages.unwrap_or_default())
        } else {
            let subject = match <[Value; 1]>::try_from(matches) {
                Ok([only]) => only,
                Err(all) => Value::Array(all),
            };
            let outcome = self.evaluate_condition(&subject, condition)?;
            (
                outcome.result,
                None,
                vec![ReasonPackage::new(Value::Array(outcome.values), subject)],
            )
        };

        let status = reclassified.unwrap_or_else(|| options.status_for(passed));
        let reason_packages = packages
            .into_iter()
            .map(|package| trim_context(package, options.log.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(target: LOG_TARGET, "'{condition}' over '{reference}' yielded {status}");

        Ok(CheckResult {
            reference: reference.to_string(),
            condition: condition.to_string(),
            status,
            passed,
            reason_packages,
        })
    }
}

/// Overrides the mapped status of a quantified check when its reasons show that there
/// was nothing to judge.
fn reclassify(outcome: &QuantifierOutcome, found: bool, options: &CheckOptions) -> Option<Status> {
    let Some(packages) = &outcome.reason_packages else {
        return Some(if found { Status::GREEN } else { options.empty_status() });
    };

    match packages.first().and_then(|package| package.reasons.as_array()).map(Vec::as_slice) {
        Some([]) => Some(options.not_found_status()),
        Some([only]) if only.is_empty_container() => Some(options.empty_status()),
        _ => None,
    }
}

fn trim_context(package: ReasonPackage, log: Option<&str>) -> Result<ReasonPackage, EvalError> {
    let context = match (package.context, log) {
        (Some(context @ (Value::Object(_) | Value::Array(_))), Some(log)) => path::first(&context, log)?,
        _ => None,
    };

    Ok(ReasonPackage {
        reasons: package.reasons,
        context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use core::time::Duration;
    use serde_json::json;

    fn builds() -> Value {
        json!({
            "builds": [
                {"id": 1, "status": "success"},
                {"id": 2, "status": "failed"},
                {"id": 3, "status": "failed"}
            ],
            "release": {"version": "1.2.0", "notes": []}
        })
    }

    fn options() -> CheckOptions {
        CheckOptions::default()
    }

    #[test]
    fn test_not_found_defaults_to_red() {
        let result = Engine::default()
            .eval_check("$ != null", "$.deployments[*]", &builds(), &options())
            .unwrap();
        assert_eq!(result.status, Status::RED);
        assert!(!result.passed);
        assert!(result.reason_packages.is_empty());
    }

    #[test]
    fn test_not_found_uses_option() {
        let opts = CheckOptions {
            return_if_not_found: Some(Status::new("MISSING")),
            ..options()
        };
        let result = Engine::default().eval_check("$ != null", "$.deployments", &builds(), &opts).unwrap();
        assert_eq!(result.status.as_str(), "MISSING");
        assert!(!result.passed);
    }

    #[test]
    fn test_filter_without_matches_is_still_evaluated() {
        let result = Engine::default()
            .eval_check("size($) == 0", "$.builds[?(@.id > 10)]", &builds(), &options())
            .unwrap();
        assert_eq!(result.status, Status::GREEN);
        assert!(result.passed);
    }

    #[test]
    fn test_quantified_filter_without_matches_is_empty() {
        let opts = CheckOptions {
            return_if_empty: Some(Status::YELLOW),
            ..options()
        };
        let result = Engine::default()
            .eval_check("all(ref, '$.status == \"success\"')", "$.builds[?(@.id > 10)]", &builds(), &opts)
            .unwrap();
        assert_eq!(result.status, Status::YELLOW);
        assert!(result.passed);
    }

    #[test]
    fn test_single_empty_array_uses_return_if_empty() {
        let opts = CheckOptions {
            return_if_empty: Some(Status::YELLOW),
            ..options()
        };
        let result = Engine::default()
            .eval_check("size($) > 0", "$.release.notes", &builds(), &opts)
            .unwrap();
        assert_eq!(result.status, Status::YELLOW);
        assert!(!result.passed);
    }

    #[test]
    fn test_array_of_empty_containers_is_empty() {
        let data = json!({"groups": [[], {}]});
        let result = Engine::default().eval_check("size($) > 0", "$.groups", &data, &options()).unwrap();
        assert_eq!(result.status, Status::RED);
    }

    #[test]
    fn test_plain_condition_on_single_match() {
        let result = Engine::default()
            .eval_check("$ == \"1.2.0\"", "$.release.version", &builds(), &options())
            .unwrap();
        assert_eq!(result.status, Status::GREEN);
        assert!(result.passed);
        assert_eq!(
            result.reason_packages,
            vec![ReasonPackage {
                reasons: json!(["1.2.0"]),
                context: None,
            }]
        );
    }

    #[test]
    fn test_plain_condition_on_many_matches_sees_the_list() {
        let result = Engine::default()
            .eval_check("$[*].status.includes(\"failed\")", "$.builds", &builds(), &options())
            .unwrap();
        assert!(result.passed);

        let result = Engine::default()
            .eval_check("size($) == 3", "$.builds[*]", &builds(), &options())
            .unwrap();
        assert!(result.passed);
    }

    #[test]
    fn test_quantified_failure_maps_status_and_trims_context() {
        let opts = CheckOptions {
            log: Some("$.id".to_string()),
            on_false: Some(Status::YELLOW),
            ..options()
        };
        let result = Engine::default()
            .eval_check("all(ref, '$.status == \"success\"')", "$.builds[*]", &builds(), &opts)
            .unwrap();

        assert_eq!(result.status, Status::YELLOW);
        assert!(!result.passed);
        assert_eq!(
            result.reason_packages,
            vec![ReasonPackage {
                reasons: json!(["failed"]),
                context: Some(json!(2)),
            }]
        );
    }

    #[test]
    fn test_context_dropped_without_log() {
        let result = Engine::default()
            .eval_check("any(ref, '$.status == \"failed\"')", "$.builds[*]", &builds(), &options())
            .unwrap();
        assert!(result.passed);
        assert_eq!(result.reason_packages.len(), 2);
        assert!(result.reason_packages.iter().all(|p| p.context.is_none()));
    }

    #[test]
    fn test_quantified_success_without_reasons_is_green() {
        let opts = CheckOptions {
            on_true: Some(Status::new("PASS")),
            ..options()
        };
        let result = Engine::default()
            .eval_check("none(ref, '$.status == \"cancelled\"')", "$.builds[*]", &builds(), &opts)
            .unwrap();
        assert_eq!(result.status, Status::GREEN);
        assert!(result.passed);
        assert!(result.reason_packages.is_empty());
    }

    #[test]
    fn test_quantified_reasons_without_values_is_not_found() {
        let opts = CheckOptions {
            return_if_not_found: Some(Status::new("MISSING")),
            ..options()
        };
        let result = Engine::default()
            .eval_check("any(ref, '$.owner == \"ada\"')", "$.builds[*]", &builds(), &opts)
            .unwrap();
        assert_eq!(result.status.as_str(), "MISSING");
        assert!(!result.passed);
    }

    #[test]
    fn test_quantified_reasons_with_empty_value_is_empty() {
        let data = json!({"jobs": [{"tags": []}]});
        let opts = CheckOptions {
            return_if_empty: Some(Status::YELLOW),
            ..options()
        };
        let result = Engine::default()
            .eval_check("all(ref, '$.tags.size() > 0')", "$.jobs[*]", &data, &opts)
            .unwrap();
        assert_eq!(result.status, Status::YELLOW);
    }

    #[test]
    fn test_eval_check_is_idempotent() {
        let opts = CheckOptions {
            log: Some("$.id".to_string()),
            ..options()
        };
        let engine = Engine::default();
        let condition = "one(ref, '$.status == \"success\"')";

        let first = engine.eval_check(condition, "$.builds[*]", &builds(), &opts).unwrap();
        let second = engine.eval_check(condition, "$.builds[*]", &builds(), &opts).unwrap();
        assert_eq!(first, second);
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
    }

    #[test]
    fn test_errors_propagate() {
        let err = Engine::default()
            .eval_check("$.id == $.status", "$.builds[*]", &builds(), &options())
            .unwrap_err();
        assert!(matches!(err, EvalError::MultipleReferences { .. }));

        let err = Engine::default()
            .eval_check("$ != null", "$.builds[", &builds(), &options())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidPath { .. }));
    }

    #[test]
    fn test_timeout_propagates_instead_of_mapping_to_red() {
        let engine = Engine::new(EngineConfig {
            continue_search_on_fail: true,
            timeout: Duration::from_millis(20),
        });
        let items: Vec<_> = (0..10_000).map(|n| json!({"n": n})).collect();
        let data = json!({ "items": items });

        let err = engine
            .eval_check("all(ref, '$.n >= 0')", "$.items[*]", &data, &options())
            .unwrap_err();
        assert!(matches!(err, EvalError::Timeout { .. }), "{err}");
    }

    #[test]
    fn test_result_serializes_with_wire_names() {
        let result = Engine::default()
            .eval_check("$ == \"1.2.0\"", "$.release.version", &builds(), &options())
            .unwrap();
        insta::assert_snapshot!(
            serde_json::to_string(&result).unwrap(),
            @r#"{"reference":"$.release.version","condition":"$ == \"1.2.0\"","status":"GREEN","bool":true,"reasonPackages":[{"reasons":["1.2.0"]}]}"#
        );
    }

    #[test]
    fn test_options_parse_from_toml() {
        let opts: CheckOptions = toml::from_str(
            r#"
            log = "$.id"
            true = "PASS"
            false = "YELLOW"
            return_if_empty = "YELLOW"
            "#,
        )
        .unwrap();
        assert_eq!(opts.status_for(true).as_str(), "PASS");
        assert_eq!(opts.status_for(false), Status::YELLOW);
        assert_eq!(opts.not_found_status(), Status::RED);

        let err = toml::from_str::<CheckOptions>("colour = \"RED\"").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_validate_definition() {
        CheckDefinition::new("$.builds[*]", "all(ref, '$.status == \"success\"')")
            .validate()
            .unwrap();
        CheckDefinition::new("$.release", "$.version.startsWith('1.')").validate().unwrap();

        let err = CheckDefinition::new("$.release", "$.version ==").validate().unwrap_err();
        assert!(matches!(err, EvalError::Sandbox { .. }));

        let err = CheckDefinition::new("$.release", "version == 1").validate().unwrap_err();
        assert!(matches!(err, EvalError::ConditionSyntax { .. }));

        let bad_log = CheckDefinition::new("$.release", "$ != null").with_options(CheckOptions {
            log: Some("$[".to_string()),
            ..CheckOptions::default()
        });
        assert!(matches!(bad_log.validate().unwrap_err(), EvalError::InvalidPath { .. }));
    }

    #[test]
    fn test_validate_quantified_element_conditions() {
        let err = CheckDefinition::new("$.builds[*]", "all(ref, '$.a == $.b')").validate().unwrap_err();
        assert!(matches!(err, EvalError::MultipleReferences { .. }), "{err}");

        let err = CheckDefinition::new("$.builds[*]", "any(ref, 'no ref')").validate().unwrap_err();
        assert!(matches!(err, EvalError::ConditionSyntax { .. }), "{err}");

        let err = CheckDefinition::new("$.builds[*]", "one(ref, '$.id ==')").validate().unwrap_err();
        assert!(matches!(err, EvalError::Sandbox { .. }), "{err}");

        let err = CheckDefinition::new("$.builds[*]", "none(ref, '$[ > 1')").validate().unwrap_err();
        assert!(matches!(err, EvalError::ConditionSyntax { .. } | EvalError::InvalidPath { .. }), "{err}");

        CheckDefinition::new("$.builds[*]", r#"all(ref, "$.status != 'failed'") && any(ref, '$.id > 1')"#)
            .validate()
            .unwrap();
    }
}
