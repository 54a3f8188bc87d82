//! Gateway base URL resolution.
//!
//! Remote operations are reached through a gateway whose base URL may come
//! from static host/port configuration or from a pluggable resolver (service
//! discovery, per-service overrides). The trait keeps that indirection a
//! seam rather than a hardcoded string.

use crate::resolver::OperationIdentity;

/// Resolves the gateway base URL for a remote operation.
pub trait GatewayResolver: Send + Sync {
    fn base_url(&self, identity: &OperationIdentity) -> String;
}

/// Fixed base URL computed from static configuration.
pub struct StaticGatewayResolver {
    base: String,
}

impl StaticGatewayResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn from_host_port(host: &str, port: u16) -> Self {
        Self {
            base: format!("http://{host}:{port}"),
        }
    }
}

impl GatewayResolver for StaticGatewayResolver {
    fn base_url(&self, _identity: &OperationIdentity) -> String {
        self.base.clone()
    }
}
