//! Single-condition evaluation
//!
//! A condition is a CEL expression containing exactly one `$` reference token. The
//! token is resolved against the reference value and replaced by a binding before the
//! expression is handed to the sandbox:
//!
//! - `value` holds the first resolved match (or `null` when nothing matched)
//! - `values` holds every resolved match, and is used when the token is the receiver
//!   of an `includes(...)` call

use super::reference::Reference;
use super::sandbox::Bindings;
use super::{Engine, EvalError, ValueExt, path};
use serde_json::Value;

const LOG_TARGET: &str = " condition";

/// Binding that receives the first resolved value.
pub const VALUE_BINDING: &str = "value";

/// Binding that receives every resolved value.
pub const VALUES_BINDING: &str = "values";

/// The result of one condition together with the values it examined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub result: bool,
    pub values: Vec<Value>,
}

/// A condition whose reference token has been replaced by a binding name.
#[derive(Debug, Clone)]
pub(crate) struct PreparedCondition {
    pub reference: Reference,
    pub expression: String,
}

impl PreparedCondition {
    pub fn new(condition: &str) -> Result<Self, EvalError> {
        let reference = Reference::scan(condition)?;
        let identifier = if reference.membership() { VALUES_BINDING } else { VALUE_BINDING };
        let expression = reference.rewrite(condition, identifier);
        Ok(Self { reference, expression })
    }
}

impl Engine {
    /// Evaluates `condition` against `reference`.
    ///
    /// Objects and arrays are queried with the token's path; any other value is used
    /// as the sole extracted value. The extracted values are always returned, whatever
    /// the outcome.
    pub fn evaluate_condition(&self, reference: &Value, condition: &str) -> Result<ConditionOutcome, EvalError> {
        let prepared = PreparedCondition::new(condition)?;

        let values = match reference {
            Value::Object(_) | Value::Array(_) => path::resolve(reference, prepared.reference.path())?,
            scalar => vec![scalar.clone()],
        };

        let bindings = Bindings::new()
            .with_variable(VALUE_BINDING, values.first().cloned().unwrap_or(Value::Null))
            .with_variable(VALUES_BINDING, Value::Array(values.clone()));

        let result = self.sandbox().run(&prepared.expression, bindings)?.is_truthy();
        log::debug!(target: LOG_TARGET, "'{condition}' evaluated to {result} over {} value(s)", values.len());

        Ok(ConditionOutcome { result, values })
    }
}
