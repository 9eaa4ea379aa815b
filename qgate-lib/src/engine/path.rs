//! JSONPath resolution
//!
//! Paths follow RFC 9535: `$.a.b`, `$.items[*]`, `$.items[0]`, `$.items[-1]`,
//! `$.items[0:2]`, `$..name` and filters such as `$.items[?(@.price < 10)]`.

use super::EvalError;
use serde_json::Value;
use serde_json_path::JsonPath;

/// Marker that introduces a filter selector inside a path.
const FILTER_MARKER: &str = "[?";

/// Parses a path expression.
pub fn compile(path: &str) -> Result<JsonPath, EvalError> {
    JsonPath::parse(path).map_err(|e| EvalError::InvalidPath {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Returns every value selected by `path`, in document order.
pub fn resolve(document: &Value, path: &str) -> Result<Vec<Value>, EvalError> {
    let compiled = compile(path)?;
    Ok(compiled.query(document).all().into_iter().cloned().collect())
}

/// Returns the first value selected by `path`, if any.
pub fn first(document: &Value, path: &str) -> Result<Option<Value>, EvalError> {
    let compiled = compile(path)?;
    Ok(compiled.query(document).first().cloned())
}

/// Whether the path contains a filter selector.
#[must_use]
pub fn has_filter(path: &str) -> bool {
    path.contains(FILTER_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "store": {
                "books": [
                    {"title": "Dune", "price": 9, "tags": ["scifi"]},
                    {"title": "Emma", "price": 15, "tags": []},
                    {"title": "Ulysses", "price": 7}
                ],
                "owner": {"name": "Ada"}
            }
        })
    }

    #[test]
    fn test_resolve_direct_child() {
        let values = resolve(&document(), "$.store.owner.name").unwrap();
        assert_eq!(values, vec![json!("Ada")]);
    }

    #[test]
    fn test_resolve_wildcard_preserves_order() {
        let values = resolve(&document(), "$.store.books[*].title").unwrap();
        assert_eq!(values, vec![json!("Dune"), json!("Emma"), json!("Ulysses")]);
    }

    #[test]
    fn test_resolve_index_and_negative_index() {
        assert_eq!(resolve(&document(), "$.store.books[0].price").unwrap(), vec![json!(9)]);
        assert_eq!(resolve(&document(), "$.store.books[-1].title").unwrap(), vec![json!("Ulysses")]);
    }

    #[test]
    fn test_resolve_filter() {
        let values = resolve(&document(), "$.store.books[?(@.price < 10)].title").unwrap();
        assert_eq!(values, vec![json!("Dune"), json!("Ulysses")]);
    }

    #[test]
    fn test_resolve_recursive_descent() {
        let values = resolve(&document(), "$..name").unwrap();
        assert_eq!(values, vec![json!("Ada")]);
    }

    #[test]
    fn test_resolve_missing_is_empty() {
        assert!(resolve(&document(), "$.store.music").unwrap().is_empty());
        assert!(resolve(&document(), "$.store.books[?(@.price > 100)]").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_root() {
        let doc = json!([1, 2]);
        assert_eq!(resolve(&doc, "$").unwrap(), vec![doc.clone()]);
    }

    #[test]
    fn test_invalid_path_is_an_error() {
        let err = resolve(&document(), "$.store[").unwrap_err();
        assert!(matches!(err, EvalError::InvalidPath { ref path, .. } if path == "$.store["));
    }

    #[test]
    fn test_first() {
        assert_eq!(first(&document(), "$.store.books[*].title").unwrap(), Some(json!("Dune")));
        assert_eq!(first(&document(), "$.nothing").unwrap(), None);
    }

    #[test]
    fn test_has_filter() {
        assert!(has_filter("$.items[?(@.a == 1)]"));
        assert!(has_filter("$.items[?@.a]"));
        assert!(!has_filter("$.items[*]"));
    }
}
