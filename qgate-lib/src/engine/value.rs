use serde_json::Value;

/// Presence and emptiness predicates over JSON values.
pub trait ValueExt {
    /// Whether the value counts as present.
    ///
    /// `null`, `false`, zero, NaN and the empty string are absent. Every array and
    /// object is present, including empty ones.
    fn is_truthy(&self) -> bool;

    /// Whether the value is an array or object without elements.
    fn is_empty_container(&self) -> bool;

    /// Whether the value is an empty container, or an array whose every element is an
    /// empty container.
    fn is_hollow(&self) -> bool;
}

impl ValueExt for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    fn is_empty_container(&self) -> bool {
        match self {
            Self::Array(items) => items.is_empty(),
            Self::Object(fields) => fields.is_empty(),
            _ => false,
        }
    }

    fn is_hollow(&self) -> bool {
        self.is_empty_container() || self.as_array().is_some_and(|items| items.iter().all(Self::is_empty_container))
    }
}
