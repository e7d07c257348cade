//! Transformer Module
//!
//! Encodes query results before they reach storage and decodes them on the
//! way back.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

/// Value encoding applied around the storage backend.
pub trait Transformer: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> Result<Value>;
}

// == JSON Transformer ==
/// Default encoding: plain JSON bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

type SerializeFn = dyn Fn(&Value) -> Result<Vec<u8>> + Send + Sync;
type DeserializeFn = dyn Fn(&[u8]) -> Result<Value> + Send + Sync;

// == Closure Transformer ==
/// Transformer assembled from a serialize/deserialize closure pair.
#[derive(Clone)]
pub struct FnTransformer {
    serialize: Arc<SerializeFn>,
    deserialize: Arc<DeserializeFn>,
}

impl FnTransformer {
    pub fn new<S, D>(serialize: S, deserialize: D) -> Self
    where
        S: Fn(&Value) -> Result<Vec<u8>> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
        }
    }
}

impl fmt::Debug for FnTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransformer").finish_non_exhaustive()
    }
}

impl Transformer for FnTransformer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        (self.serialize)(value)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        (self.deserialize)(bytes)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    #[test]
    fn test_json_transformer_representative_shapes() {
        let t = JsonTransformer;
        for value in [
            json!(42),
            json!({"id": 1, "author": {"name": "ada", "tags": ["a", "b"]}}),
            json!([{"id": 1, "status": "published"}, {"id": 2, "status": "draft"}]),
        ] {
            let bytes = t.serialize(&value).unwrap();
            assert_eq!(t.deserialize(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_json_transformer_rejects_garbage() {
        let result = JsonTransformer.deserialize(b"{not json");
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[test]
    fn test_fn_transformer_applies_closures() {
        // Reverses the JSON bytes on the way in and back on the way out
        let t = FnTransformer::new(
            |v| {
                let mut bytes = serde_json::to_vec(v)?;
                bytes.reverse();
                Ok(bytes)
            },
            |b| {
                let mut bytes = b.to_vec();
                bytes.reverse();
                Ok(serde_json::from_slice(&bytes)?)
            },
        );

        let value = json!({"id": 7});
        let bytes = t.serialize(&value).unwrap();
        assert_ne!(bytes, serde_json::to_vec(&value).unwrap());
        assert_eq!(t.deserialize(&bytes).unwrap(), value);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_json_transformer_roundtrip(value in arb_json()) {
            let t = JsonTransformer;
            let bytes = t.serialize(&value).unwrap();
            prop_assert_eq!(t.deserialize(&bytes).unwrap(), value);
        }
    }
}
