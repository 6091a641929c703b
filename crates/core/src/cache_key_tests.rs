// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn empty_settings_key_is_just_the_id() {
    let id = AgentId::new("primes");
    assert_eq!(derive_cache_key(&id, &Value::Null, None), "primes");
    assert_eq!(derive_cache_key(&id, &json!({}), None), "primes");
}

#[test]
fn non_empty_settings_hash_is_prefixed_by_id() {
    let id = AgentId::new("primes");
    let key = derive_cache_key(&id, &json!({"limit": 1000}), None);
    assert!(key.starts_with("primes-"));
    assert_eq!(key.len(), "primes-".len() + 64);
}

#[test]
fn key_order_does_not_perturb_the_result() {
    let id = AgentId::new("primes");
    let a = derive_cache_key(&id, &json!({"limit": 1000, "offset": 5}), None);
    let b = derive_cache_key(&id, &json!({"offset": 5, "limit": 1000}), None);
    assert_eq!(a, b);
}

#[test]
fn nested_object_order_does_not_perturb_the_result() {
    let id = AgentId::new("search");
    let a = derive_cache_key(&id, &json!({"filter": {"a": 1, "b": 2}}), None);
    let b = derive_cache_key(&id, &json!({"filter": {"b": 2, "a": 1}}), None);
    assert_eq!(a, b);
}

#[test]
fn dollar_prefixed_hints_do_not_affect_the_key() {
    let id = AgentId::new("primes");
    let a = derive_cache_key(&id, &json!({"limit": 1000}), None);
    let b = derive_cache_key(&id, &json!({"limit": 1000, "$forceRun": true}), None);
    assert_eq!(a, b);
}

#[test]
fn different_settings_hash_differently() {
    let id = AgentId::new("primes");
    let a = derive_cache_key(&id, &json!({"limit": 1000}), None);
    let b = derive_cache_key(&id, &json!({"limit": 2000}), None);
    assert_ne!(a, b);
}

#[test]
fn key_rewrite_hook_is_applied() {
    let id = AgentId::new("primes");
    let rewrite: &KeyRewrite = &|k| format!("ns:{k}");
    let key = derive_cache_key(&id, &json!({}), Some(rewrite));
    assert_eq!(key, "ns:primes");
}

proptest::proptest! {
    /// Testable Property 1 (key determinism): for all ids and settings
    /// that are deep-equal up to key order, derive_cache_key agrees, and
    /// `$`-prefixed fields never affect the result.
    #[test]
    fn prop_key_determinism(limit in 0u64..100_000, offset in 0u64..100_000, hint in 0u64..100_000) {
        let id = AgentId::new("prop-agent");
        let forward = json!({"limit": limit, "offset": offset});
        let reversed = json!({"offset": offset, "limit": limit});
        proptest::prop_assert_eq!(
            derive_cache_key(&id, &forward, None),
            derive_cache_key(&id, &reversed, None)
        );

        let with_hint = json!({"limit": limit, "offset": offset, "$hint": hint});
        proptest::prop_assert_eq!(
            derive_cache_key(&id, &forward, None),
            derive_cache_key(&id, &with_hint, None)
        );
    }
}
