//! Isolated expression execution
//!
//! Every call to [`Sandbox::run`] compiles the expression and builds a brand-new CEL
//! context containing only the caller's [`Bindings`]. CEL has no I/O, no loops and no
//! access to the host, so the bindings are the entire world visible to a condition.
//!
//! Evaluation happens on a dedicated worker thread while the caller waits on a channel
//! with a deadline. When the deadline passes the caller gets [`EvalError::Timeout`] and
//! the channel is dropped; the worker's late result goes nowhere and cannot affect any
//! other evaluation. A sandbox may also carry an absolute deadline shared with an
//! enclosing evaluation, in which case it waits only for what is left of that budget.
//!
//! The CEL parser can panic on some malformed input, so compilation runs behind a panic
//! boundary and such failures surface as [`EvalError::Sandbox`] like any other parse error.

use super::EvalError;
use cel_interpreter::extractors::This;
use cel_interpreter::objects::{Key, Map};
use cel_interpreter::{Context, Program, Value as CelValue};
use core::any::Any;
use core::fmt;
use core::time::Duration;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::panic;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

const LOG_TARGET: &str = "   sandbox";

/// Callable bindings that can be installed into a fresh sandbox context.
pub trait Extension: Send + 'static {
    fn install(&self, context: &mut Context<'_>);
}

/// Named values and callables injected into a sandbox context.
#[derive(Default)]
pub struct Bindings {
    variables: Vec<(String, Value)>,
    extensions: Vec<Box<dyn Extension>>,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Extension) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("variables", &self.variables.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Runs expressions in isolated, time-bounded CEL contexts.
#[derive(Debug, Clone, Copy)]
pub struct Sandbox {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Sandbox {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout, deadline: None }
    }

    /// Limits every run to end no later than `deadline`, on top of the per-run timeout.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluates `expression` with `bindings` and returns its result as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Timeout`] if evaluation exceeds the time budget and
    /// [`EvalError::Sandbox`] if the expression cannot be compiled or executed.
    pub fn run(&self, expression: &str, bindings: Bindings) -> Result<Value, EvalError> {
        let start_time = Instant::now();
        let budget = self
            .deadline
            .map_or(self.timeout, |deadline| deadline.saturating_duration_since(start_time).min(self.timeout));
        if budget.is_zero() {
            return Err(self.timed_out(expression));
        }

        let (tx, rx) = mpsc::channel();
        let source = expression.to_string();

        let _worker = thread::Builder::new()
            .name("qgate-sandbox".to_string())
            .spawn(move || {
                let _ = tx.send(execute(&source, bindings));
            })
            .map_err(|e| EvalError::sandbox(expression, format!("could not start sandbox worker: {e}")))?;

        match rx.recv_timeout(budget) {
            Ok(result) => {
                log::trace!(target: LOG_TARGET, "Evaluated '{expression}' in {:?}", start_time.elapsed());
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(target: LOG_TARGET, "Abandoned '{expression}' after {:?}", start_time.elapsed());
                Err(self.timed_out(expression))
            }
            Err(RecvTimeoutError::Disconnected) => Err(EvalError::sandbox(expression, "sandbox worker terminated unexpectedly")),
        }
    }

    fn timed_out(&self, expression: &str) -> EvalError {
        EvalError::Timeout {
            expression: expression.to_string(),
            timeout: self.timeout,
        }
    }
}

/// Compiles `expression` without running it.
pub fn check_syntax(expression: &str) -> Result<(), EvalError> {
    let _ = compile(expression)?;
    Ok(())
}

fn compile(expression: &str) -> Result<Program, EvalError> {
    panic::catch_unwind(|| Program::compile(expression))
        .map_err(|payload| EvalError::sandbox(expression, format!("could not parse expression: {}", panic_message(payload.as_ref()))))?
        .map_err(|e| EvalError::sandbox(expression, format!("could not parse expression: {e}")))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("parser failure")
}

fn execute(expression: &str, bindings: Bindings) -> Result<Value, EvalError> {
    let program = compile(expression)?;

    let mut context = Context::default();
    context.add_function("includes", includes);

    for (name, value) in bindings.variables {
        context.add_variable_from_value(name, to_cel(value));
    }

    for extension in &bindings.extensions {
        extension.install(&mut context);
    }

    let result = program.execute(&context).map_err(|e| EvalError::sandbox(expression, e))?;
    from_cel(&result).ok_or_else(|| EvalError::sandbox(expression, format!("unsupported result value '{result:?}'")))
}

/// Membership test: `list.includes(x)` or `string.includes(substring)`.
fn includes(This(this): This<CelValue>, needle: CelValue) -> bool {
    match (this, needle) {
        (CelValue::List(items), needle) => items.contains(&needle),
        (CelValue::String(haystack), CelValue::String(needle)) => haystack.contains(needle.as_str()),
        _ => false,
    }
}

/// Converts a JSON value into its CEL counterpart.
pub(crate) fn to_cel(value: Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(b),
        Value::Number(n) => n
            .as_i64()
            .map(CelValue::Int)
            .or_else(|| n.as_u64().map(CelValue::UInt))
            .unwrap_or_else(|| CelValue::Float(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => CelValue::String(Arc::new(s)),
        Value::Array(items) => CelValue::List(Arc::new(items.into_iter().map(to_cel).collect())),
        Value::Object(fields) => {
            let map: HashMap<Arc<String>, CelValue> = fields.into_iter().map(|(k, v)| (Arc::new(k), to_cel(v))).collect();
            CelValue::Map(Map::from(map))
        }
    }
}

/// Converts a CEL value back into JSON. Returns `None` for values with no JSON form.
pub(crate) fn from_cel(value: &CelValue) -> Option<Value> {
    let json = match value {
        CelValue::Null => Value::Null,
        CelValue::Bool(b) => Value::Bool(*b),
        CelValue::Int(i) => Value::from(*i),
        CelValue::UInt(u) => Value::from(*u),
        CelValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        CelValue::String(s) => Value::String(s.to_string()),
        CelValue::List(items) => Value::Array(items.iter().map(from_cel).collect::<Option<Vec<_>>>()?),
        CelValue::Map(map) => {
            let mut fields = serde_json::Map::new();
            for (key, value) in map.map.iter() {
                let key = match key {
                    Key::String(s) => s.to_string(),
                    Key::Int(i) => i.to_string(),
                    Key::Uint(u) => u.to_string(),
                    Key::Bool(b) => b.to_string(),
                };
                let _ = fields.insert(key, from_cel(value)?);
            }
            Value::Object(fields)
        }
        _ => return None,
    };

    Some(json)
}
