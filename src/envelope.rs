//! Normalized response envelopes.
//!
//! Every user-visible failure is reduced to `{ "ok": false, "error": <code>,
//! "data": <details> }`; successes merge the payload into `{ "ok": true }`.
//! Codes are `snake_case` (see [`crate::error::normalize_code`]).

use serde_json::{json, Map, Value};

use crate::error::{normalize_code, DispatchError};

/// Success envelope. An object payload is merged into the envelope; any other
/// non-null payload lands under `"data"`.
pub fn ok(payload: Value) -> Value {
    let mut map = Map::new();
    map.insert("ok".to_string(), Value::Bool(true));
    match payload {
        Value::Object(extra) => map.extend(extra),
        Value::Null => {}
        other => {
            map.insert("data".to_string(), other);
        }
    }
    Value::Object(map)
}

/// Failure envelope with a normalized code and optional detail data.
pub fn failure(code: &str, data: Option<Value>) -> Value {
    let mut map = Map::new();
    map.insert("ok".to_string(), Value::Bool(false));
    map.insert("error".to_string(), Value::String(normalize_code(code)));
    if let Some(data) = data {
        map.insert("data".to_string(), data);
    }
    Value::Object(map)
}

/// Map a dispatch error onto the generic failure envelope.
pub fn from_error(err: &DispatchError) -> Value {
    match err {
        DispatchError::Handler { code, data } => failure(code, data.clone()),
        DispatchError::DuplicateOperation(key) => {
            failure("duplicate_operation", Some(json!(key)))
        }
        DispatchError::UnresolvedReference { reference, reason } => failure(
            "unresolved_reference",
            Some(json!({ "reference": reference, "reason": reason })),
        ),
        DispatchError::RemoteCallFailed { url, source } => failure(
            "remote_call_failed",
            Some(json!({ "url": url, "cause": source.to_string() })),
        ),
        DispatchError::OperationDiscovery { path, reason } => failure(
            "operation_discovery_failed",
            Some(json!({ "path": path, "reason": reason })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_payload_is_merged() {
        let env = ok(json!({ "answer": "pong" }));
        assert_eq!(env, json!({ "ok": true, "answer": "pong" }));
    }

    #[test]
    fn scalar_payload_goes_under_data() {
        let env = ok(json!(42));
        assert_eq!(env, json!({ "ok": true, "data": 42 }));
    }

    #[test]
    fn failure_normalizes_code() {
        let env = failure("Not Found", None);
        assert_eq!(env, json!({ "ok": false, "error": "not_found" }));
    }
}
