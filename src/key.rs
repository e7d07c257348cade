//! Key Module
//!
//! Deterministic cache keys and invalidation tags for a query.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Separates the model name from the key inside a tag.
pub const TAG_SEPARATOR: char = '~';

// == Cache Key ==
/// Derives the cache key for a query.
///
/// `prefix` is the model name unless the model overrides it. Arguments are
/// canonicalized first, so key order inside objects never changes the key.
pub fn cache_key(prefix: &str, model: &str, operation: &str, args: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(&mut canonical, &Value::String(model.to_string()));
    canonical.push('|');
    canonical.push_str(operation);
    canonical.push('|');
    write_canonical(&mut canonical, args);

    let digest = Sha256::digest(canonical.as_bytes());
    format!("{}:{}:{}", prefix, operation, hex::encode(digest))
}

// == Tags ==
/// The entity-wide tag every entry of `model` carries.
pub fn model_tag(model: &str, key: &str) -> String {
    format!("{}{}{}", model, TAG_SEPARATOR, key)
}

/// Pattern matching every tag produced by [`model_tag`] for `model`.
pub fn model_pattern(model: &str) -> String {
    format!("*{}{}*", model, TAG_SEPARATOR)
}

/// Stable JSON rendering with object keys sorted at every level.
fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Escaping a plain string through serde_json cannot fail
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(out, v);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_deterministic() {
        let args = json!({"where": {"status": "published"}});
        assert_eq!(
            cache_key("Post", "Post", "findMany", &args),
            cache_key("Post", "Post", "findMany", &args.clone())
        );
    }

    #[test]
    fn test_key_ignores_object_key_order() {
        let a: Value = serde_json::from_str(r#"{"take": 10, "where": {"a": 1, "b": 2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"where": {"b": 2, "a": 1}, "take": 10}"#).unwrap();
        assert_eq!(
            cache_key("Post", "Post", "findMany", &a),
            cache_key("Post", "Post", "findMany", &b)
        );
    }

    #[test]
    fn test_key_differs_by_args_operation_and_model() {
        let args = json!({"where": {"id": 1}});
        let base = cache_key("Post", "Post", "findUnique", &args);

        assert_ne!(base, cache_key("Post", "Post", "findUnique", &json!({"where": {"id": 2}})));
        assert_ne!(base, cache_key("Post", "Post", "findFirst", &args));
        assert_ne!(base, cache_key("Post", "User", "findUnique", &args));
    }

    #[test]
    fn test_array_order_is_significant() {
        assert_ne!(
            cache_key("Post", "Post", "findMany", &json!({"orderBy": ["a", "b"]})),
            cache_key("Post", "Post", "findMany", &json!({"orderBy": ["b", "a"]}))
        );
    }

    #[test]
    fn test_key_shape() {
        let key = cache_key("posts", "Post", "count", &json!({}));
        assert!(key.starts_with("posts:count:"));
        assert!(!key.contains(TAG_SEPARATOR));
        assert_eq!(key.len(), "posts:count:".len() + 64);
    }

    #[test]
    fn test_tag_and_pattern() {
        assert_eq!(model_tag("Post", "k1"), "Post~k1");
        assert_eq!(model_pattern("Post"), "*Post~*");
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": [{"d": 1, "c": 2}], "a": "x"});
        let mut out = String::new();
        write_canonical(&mut out, &value);
        assert_eq!(out, r#"{"a":"x","b":[{"c":2,"d":1}]}"#);
    }
}
