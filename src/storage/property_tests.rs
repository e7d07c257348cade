//! Property-Based Tests for the In-Process Store
//!
//! Capacity, LRU order and reference-index consistency under random
//! operation sequences.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::key::{model_pattern, model_tag};
use crate::storage::MemoryStore;

// == Test Configuration ==
const TEST_TTL: u64 = 300;

// == Strategies ==
fn model_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Post", "User", "Comment", "Tag"]).prop_map(str::to_string)
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,12}"
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

#[derive(Debug, Clone)]
enum StoreOp {
    Set { model: String, key: String, value: Vec<u8> },
    Get { key: String },
    Purge { model: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (model_strategy(), key_strategy(), value_strategy())
            .prop_map(|(model, key, value)| StoreOp::Set { model, key, value }),
        key_strategy().prop_map(|key| StoreOp::Get { key }),
        model_strategy().prop_map(|model| StoreOp::Purge { model }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // A purge of model M leaves no entry that was last stored under M, and
    // leaves every entry stored under another model in place.
    #[test]
    fn prop_purge_removes_exactly_the_model(ops in prop::collection::vec(store_op_strategy(), 1..80)) {
        let mut store = MemoryStore::new(1000);
        // key -> model it was last stored under
        let mut owners: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Set { model, key, value } => {
                    store.set(key.clone(), value, TEST_TTL, &[model_tag(&model, &key)]).unwrap();
                    owners.insert(key, model);
                }
                StoreOp::Get { key } => {
                    prop_assert_eq!(store.get(&key).is_some(), owners.contains_key(&key));
                }
                StoreOp::Purge { model } => {
                    let expected = owners.values().filter(|m| **m == model).count();
                    let removed = store.invalidate(&[model_pattern(&model)]);
                    prop_assert_eq!(removed, expected);
                    owners.retain(|_, m| *m != model);
                }
            }
        }

        prop_assert_eq!(store.len(), owners.len());
        let live_models: HashSet<&String> = owners.values().collect();
        prop_assert!(store.reference_count() >= live_models.len());
    }

    // The store never holds more than its capacity.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let mut store = MemoryStore::new(max_entries);

        for (key, value) in entries {
            store.set(key.clone(), value, TEST_TTL, &[model_tag("Post", &key)]).unwrap();
            prop_assert!(store.len() <= max_entries);
            prop_assert!(store.reference_count() <= store.len());
        }
    }

    // With the store full, inserting a new key evicts the least recently
    // used one; a read counts as a use.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::vec(key_strategy(), 3..8),
        new_key in key_strategy()
    ) {
        let mut unique_keys: Vec<String> = Vec::new();
        for key in keys {
            if !unique_keys.contains(&key) {
                unique_keys.push(key);
            }
        }
        prop_assume!(unique_keys.len() >= 3);
        prop_assume!(!unique_keys.contains(&new_key));

        let mut store = MemoryStore::new(unique_keys.len());
        for key in &unique_keys {
            store.set(key.clone(), key.as_bytes().to_vec(), TEST_TTL, &[]).unwrap();
        }

        store.get(&unique_keys[0]);
        store.set(new_key.clone(), b"new".to_vec(), TEST_TTL, &[]).unwrap();

        prop_assert!(store.get(&unique_keys[0]).is_some());
        prop_assert!(store.get(&unique_keys[1]).is_none());
        prop_assert!(store.get(&new_key).is_some());
        prop_assert_eq!(store.evictions(), 1);
    }
}
