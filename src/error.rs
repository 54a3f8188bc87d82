//! Error taxonomy for the dispatch runtime.
//!
//! Registration errors (`DuplicateOperation`, invalid schemas) are raised at
//! startup and are fatal: a process must not serve traffic with a broken
//! registry. Per-call errors are returned to the immediate caller as a
//! `Result`, never thrown into an unrelated context. Cache store failures are
//! a separate, best-effort kind (see [`crate::cache::CacheStoreError`]) that
//! is logged and swallowed inside the cache layer.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced by registration and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// An operation with the same `service:version:operation` key is already
    /// registered. The second registration's handler is never reachable.
    #[error("duplicate operation `{0}`")]
    DuplicateOperation(String),

    /// A short operation reference could not be parsed. Caller error.
    #[error("unresolved operation reference `{reference}`: {reason}")]
    UnresolvedReference { reference: String, reason: String },

    /// Transport-level failure calling a remote operation.
    #[error("remote call to `{url}` failed")]
    RemoteCallFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    /// A directory of operation definition files could not be loaded.
    /// Raised at startup, fatal like other registration errors.
    #[error("failed to load operation definitions from `{path}`: {reason}")]
    OperationDiscovery { path: String, reason: String },

    /// Business error raised by an operation or a chain step, carrying a
    /// machine-readable code and optional detail data.
    #[error("operation failed with code `{code}`")]
    Handler { code: String, data: Option<Value> },
}

impl DispatchError {
    /// Business error with its code normalized to `snake_case`.
    pub fn handler(code: &str, data: Option<Value>) -> Self {
        DispatchError::Handler {
            code: normalize_code(code),
            data,
        }
    }

    pub fn unresolved(reference: &str, reason: &str) -> Self {
        DispatchError::UnresolvedReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Normalize an error code: trimmed, lowercased, spaces to underscores.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_code("Not Found"), "not_found");
        assert_eq!(normalize_code(" Payment Required "), "payment_required");
    }

    #[test]
    fn handler_constructor_normalizes() {
        match DispatchError::handler("Bad Input", None) {
            DispatchError::Handler { code, .. } => assert_eq!(code, "bad_input"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
