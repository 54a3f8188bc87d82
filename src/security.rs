//! Authentication capability.
//!
//! Token verification mechanics (JWT parsing, signature checks, key
//! rotation) live behind the [`Authenticator`] trait: the runtime only needs
//! "token in, identity or rejection out". Scope enforcement happens in the
//! dispatch pipeline against the identity returned here.

use crate::error::DispatchError;

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub client_id: String,
    pub scope: Vec<String>,
}

impl Identity {
    pub fn new(client_id: impl Into<String>, scope: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            scope,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }
}

/// Opaque authentication capability: given a bearer token, return the caller
/// identity or reject.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Identity, DispatchError>;
}

/// Strip an optional `Bearer ` prefix from an authorization header value.
pub fn strip_bearer(value: &str) -> &str {
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim()
}

/// Fixed-token authenticator for local wiring and tests: one known token
/// maps to one identity, everything else is rejected.
pub struct StaticTokenAuthenticator {
    token: String,
    identity: Identity,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>, identity: Identity) -> Self {
        Self {
            token: token.into(),
            identity,
        }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Identity, DispatchError> {
        if strip_bearer(token) == self.token {
            Ok(self.identity.clone())
        } else {
            Err(DispatchError::handler("unauthorized", None))
        }
    }
}
