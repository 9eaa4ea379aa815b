use core::time::Duration;
use thiserror::Error;

/// Failures raised while evaluating conditions, checks, or concatenations.
///
/// Data edge cases such as an empty or missing reference are never errors; they are
/// turned into statuses by the check evaluator. Everything here is either an authoring
/// defect or a sandbox failure, and is propagated to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The condition contains no `$` reference token.
    #[error("condition '{condition}' contains no reference token")]
    ConditionSyntax { condition: String },

    /// The condition references more than one distinct path.
    #[error("condition '{condition}' references more than one path: {}", tokens.join(", "))]
    MultipleReferences { condition: String, tokens: Vec<String> },

    /// The sandbox did not finish within its time budget.
    #[error("expression '{expression}' did not complete within {} ms", timeout.as_millis())]
    Timeout { expression: String, timeout: Duration },

    /// The expression failed to compile or to execute.
    #[error("could not evaluate expression '{expression}': {message}")]
    Sandbox { expression: String, message: String },

    /// A concatenation references a check that is not in the registry.
    #[error("concatenation references unknown check '{name}'")]
    UnknownCheck { name: String },

    /// A concatenation input is not one of GREEN, YELLOW or RED.
    #[error("check '{name}' has status '{status}', but concatenation only accepts GREEN, YELLOW or RED")]
    UnsupportedStatus { name: String, status: String },

    /// A JSONPath expression could not be parsed.
    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },
}

impl EvalError {
    pub(crate) fn sandbox(expression: impl Into<String>, message: impl ToString) -> Self {
        Self::Sandbox {
            expression: expression.into(),
            message: message.to_string(),
        }
    }
}
