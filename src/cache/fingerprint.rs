//! Structural payload fingerprints.
//!
//! A fingerprint is a SHA-256 hash over a canonical serialization of a JSON
//! payload: object keys are visited in sorted order, so two structurally
//! equal payloads produce the same fingerprint regardless of key insertion
//! order. Arrays remain order-sensitive.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic, order-insensitive hash of a payload's structural content.
pub fn fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hash_value(payload, &mut hasher);
    format!("{:x}", hasher.finalize())
}

fn hash_value(value: &Value, hasher: &mut Sha256) {
    // Each variant is tagged and length-prefixed so that concatenations
    // cannot collide across shapes.
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => {
            hasher.update(b"b");
            hasher.update([u8::from(*b)]);
        }
        Value::Number(n) => {
            let repr = n.to_string();
            hasher.update(b"#");
            hasher.update((repr.len() as u64).to_be_bytes());
            hasher.update(repr.as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update((s.len() as u64).to_be_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"[");
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            hasher.update(b"{");
            hasher.update((map.len() as u64).to_be_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update((key.len() as u64).to_be_bytes());
                hasher.update(key.as_bytes());
                if let Some(child) = map.get(key.as_str()) {
                    hash_value(child, hasher);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({ "x": 1, "y": { "a": true, "b": [1, 2] } });
        let b = json!({ "y": { "b": [1, 2], "a": true }, "x": 1 });
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn values_matter() {
        let a = json!({ "x": 1 });
        let b = json!({ "x": 2 });
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn array_order_matters() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn shapes_do_not_collide() {
        // "12" as a string vs as a number, and nesting vs flattening
        assert_ne!(fingerprint(&json!("12")), fingerprint(&json!(12)));
        assert_ne!(
            fingerprint(&json!({ "a": { "b": 1 } })),
            fingerprint(&json!({ "a.b": 1 }))
        );
    }
}
