//! Payload validation against per-operation JSON Schemas.
//!
//! Schemas are compiled once at registration time; a broken schema fails the
//! registration rather than every request. Validation failures produce a
//! `validation_error` with one `"field: message"` entry per offending field.

use serde_json::{json, Value};

use crate::error::DispatchError;

/// Compiled request schema for one operation.
pub struct PayloadSchema {
    validator: jsonschema::Validator,
}

impl PayloadSchema {
    /// Compile a JSON Schema document.
    pub fn compile(schema: &Value) -> Result<Self, DispatchError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| {
            DispatchError::handler("invalid_schema", Some(Value::String(e.to_string())))
        })?;
        Ok(Self { validator })
    }

    /// Validate an effective payload, collecting one message per offending
    /// field.
    pub fn validate(&self, payload: &Value) -> Result<(), DispatchError> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(payload)
            .map(|error| {
                let pointer = error.instance_path().to_string();
                let field = if pointer.is_empty() {
                    "payload".to_string()
                } else {
                    pointer.trim_start_matches('/').replace('/', ".")
                };
                format!("{field}: {error}")
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::handler(
                "validation_error",
                Some(json!(errors)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> PayloadSchema {
        PayloadSchema::compile(&json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "qty": { "type": "integer", "minimum": 1 }
            },
            "required": ["name"]
        }))
        .unwrap()
    }

    #[test]
    fn valid_payload_passes() {
        assert!(schema().validate(&json!({ "name": "widget", "qty": 2 })).is_ok());
    }

    #[test]
    fn one_message_per_offending_field() {
        let err = schema()
            .validate(&json!({ "qty": 0 }))
            .unwrap_err();
        match err {
            DispatchError::Handler { code, data } => {
                assert_eq!(code, "validation_error");
                let messages = data.unwrap();
                let messages = messages.as_array().unwrap();
                assert_eq!(messages.len(), 2);
                assert!(messages
                    .iter()
                    .any(|m| m.as_str().unwrap().starts_with("qty:")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_fields_use_dotted_paths() {
        let schema = PayloadSchema::compile(&json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": { "type": "integer" }
                }
            }
        }))
        .unwrap();
        let err = schema.validate(&json!({ "items": [1, "two"] })).unwrap_err();
        match err {
            DispatchError::Handler { data, .. } => {
                let messages = data.unwrap();
                let messages = messages.as_array().unwrap();
                assert!(messages
                    .iter()
                    .any(|m| m.as_str().unwrap().starts_with("items.1:")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_schema_fails_compilation() {
        assert!(PayloadSchema::compile(&json!({ "type": "nope" })).is_err());
    }
}
