//! Structural deep merge over JSON values
//!
//! Objects merge key-wise and recursively; arrays and scalars in the patch
//! replace whatever the target held. A `null` in the patch is a value like
//! any other and overwrites the target key.
//!
//! The merge is not commutative: applying `a` then `b` lets `b` win on every
//! conflicting scalar, while `b` then `a` lets `a` win.

use serde_json::{Map, Value};

/// Merge `patch` into `target` in place
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => merge_objects(target, patch),
        (target, patch) => *target = patch,
    }
}

fn merge_objects(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match target.get_mut(&key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                deep_merge(existing, value);
            }
            _ => {
                target.insert(key, value);
            }
        }
    }
}

/// Return a merged copy without touching the inputs
pub fn merged(target: &Value, patch: &Value) -> Value {
    let mut out = target.clone();
    deep_merge(&mut out, patch.clone());
    out
}
