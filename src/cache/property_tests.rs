//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check routing and accounting invariants of the engine.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::cache::{hash_key, CacheEngine, Status};
use crate::config::CacheOptions;

// == Test Configuration ==
const TEST_SHARD_COUNT: usize = 8;

fn engine() -> CacheEngine {
    CacheEngine::new(CacheOptions {
        shard_count: TEST_SHARD_COUNT,
        max_memory_mb: 1,
        ..CacheOptions::default()
    })
    .unwrap()
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}"
}

/// Generates cache values, including empty ones
fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..128)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Vec<u8> },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Routing is a pure function of the key and always lands inside the shard range.
    #[test]
    fn prop_routing_is_stable(key in ".{0,64}") {
        let engine = engine();
        let index = engine.shard_index(&key);
        prop_assert!(index < TEST_SHARD_COUNT);
        prop_assert_eq!(index, engine.shard_index(&key));
        prop_assert_eq!(index, (hash_key(&key) as usize) & (TEST_SHARD_COUNT - 1));
    }

    // A stored value is returned unchanged by the next read.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let engine = engine();
        let fetched = block_on(async {
            engine.set(&key, &value, 0).await.unwrap();
            engine.get(&key).await
        });
        prop_assert_eq!(fetched.unwrap().to_vec(), value);
    }

    // After any sequence of operations the aggregated status matches a model map.
    #[test]
    fn prop_accounting_matches_contents(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let engine = engine();
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();

        block_on(async {
            for op in ops {
                match op {
                    CacheOp::Set { key, value } => {
                        engine.set(&key, &value, 0).await.unwrap();
                        model.insert(key, value);
                    }
                    CacheOp::Get { key } => {
                        let fetched = engine.get(&key).await.map(|b| b.to_vec());
                        assert_eq!(fetched.as_ref(), model.get(&key));
                    }
                    CacheOp::Delete { key } => {
                        engine.delete(&key).await;
                        model.remove(&key);
                    }
                }
            }
        });

        let mut expected = Status::new();
        for (key, value) in &model {
            expected.add_entry(key, value);
        }
        prop_assert_eq!(block_on(engine.status()), expected);
    }
}
