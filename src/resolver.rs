//! Short operation reference parsing.
//!
//! A reference is one to three `:`-separated segments:
//!
//! - `"orders"` -> service `orders`, version `v1`, operation `orders`
//! - `"orders:list"` -> service `orders`, version `v1`, operation `list`
//! - `"orders:v2:list"` -> service `orders`, version `v2`, operation `list`
//!
//! References with empty segments or more than three segments are rejected
//! with [`DispatchError::UnresolvedReference`]; truncating would silently
//! mis-route the call.

use std::fmt::{Display, Formatter};

use crate::error::DispatchError;

/// Version assumed when a short reference omits one.
pub const DEFAULT_VERSION: &str = "v1";

/// Fully qualified identity of an operation. Uniqueness is on the composite
/// key `service:version:operation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationIdentity {
    pub service: String,
    pub version: String,
    pub operation: String,
}

impl OperationIdentity {
    pub fn new(
        service: impl Into<String>,
        version: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            operation: operation.into(),
        }
    }

    /// Composite registry key, `service:version:operation`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.service, self.version, self.operation)
    }
}

impl Display for OperationIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.version, self.operation)
    }
}

/// Parse a short operation reference into an [`OperationIdentity`].
///
/// Pure function, no side effects.
pub fn resolve(reference: &str) -> Result<OperationIdentity, DispatchError> {
    let segments: Vec<&str> = reference.split(':').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DispatchError::unresolved(reference, "empty segment"));
    }
    match segments.as_slice() {
        [service] => Ok(OperationIdentity::new(*service, DEFAULT_VERSION, *service)),
        [service, operation] => Ok(OperationIdentity::new(
            *service,
            DEFAULT_VERSION,
            *operation,
        )),
        [service, version, operation] => {
            Ok(OperationIdentity::new(*service, *version, *operation))
        }
        _ => Err(DispatchError::unresolved(
            reference,
            "more than 3 segments",
        )),
    }
}
