//! Operation registry: the mapping from a composite operation key to its
//! routing metadata.
//!
//! Any identity present in the registry is local to this process; any name
//! absent from it is treated as remote by the dispatcher. Registrations are
//! immutable once added and live for the life of the process (there is no
//! runtime unregister).

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde::Deserialize;
use tracing::info;

use crate::cache::KeyGenerator;
use crate::error::DispatchError;
use crate::resolver::OperationIdentity;
use crate::validator::PayloadSchema;

/// How exposed route paths and methods are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteStyle {
    /// `{base}/{service}/{version}/{operation}{subpath}`, method defaults to
    /// POST unless declared.
    Rest,
    /// `{base}/{service}/{version}/{operation}`; GET and POST are both
    /// accepted regardless of the declared method.
    Rpc,
}

impl Default for RouteStyle {
    fn default() -> Self {
        RouteStyle::Rest
    }
}

/// Build the exposed route path for an operation.
pub fn operation_path(base: &str, identity: &OperationIdentity, subpath: Option<&str>) -> String {
    format!(
        "{}/{}/{}/{}{}",
        base,
        identity.service,
        identity.version,
        identity.operation,
        subpath.unwrap_or("")
    )
}

/// Cache wiring resolved at registration time: the concrete cache name plus
/// the policy's key generator.
#[derive(Clone)]
pub struct CacheBinding {
    pub name: String,
    pub key_generator: Option<KeyGenerator>,
}

/// Metadata supplied by a registration, before route building.
pub struct RouteSpec {
    pub identity: OperationIdentity,
    pub method: Option<Method>,
    pub subpath: Option<String>,
    pub scope: Option<String>,
    pub cache: Option<CacheBinding>,
    pub schema: Option<Arc<PayloadSchema>>,
}

/// Routing metadata for one registered operation. Owned exclusively by the
/// registry.
pub struct OperationRoute {
    pub identity: OperationIdentity,
    pub methods: Vec<Method>,
    pub path: String,
    /// REST subpath template the route was declared with, e.g. `/{id}`.
    pub subpath: Option<String>,
    pub scope: Option<String>,
    pub cache: Option<CacheBinding>,
    pub schema: Option<Arc<PayloadSchema>>,
}

impl std::fmt::Debug for OperationRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRoute")
            .field("identity", &self.identity)
            .field("methods", &self.methods)
            .field("path", &self.path)
            .field("subpath", &self.subpath)
            .field("scope", &self.scope)
            .field("cache", &self.cache.as_ref().map(|cache| &cache.name))
            .field("has_schema", &self.schema.is_some())
            .finish()
    }
}

/// Registry of locally exposed operations, keyed by
/// `service:version:operation`.
pub struct Registry {
    style: RouteStyle,
    base_path: String,
    routes: HashMap<String, OperationRoute>,
}

impl Registry {
    pub fn new(style: RouteStyle, base_path: impl Into<String>) -> Self {
        Self {
            style,
            base_path: base_path.into(),
            routes: HashMap::new(),
        }
    }

    pub fn style(&self) -> RouteStyle {
        self.style
    }

    /// Register an operation, building its exposed path and methods from the
    /// configured route style. Fails with `DuplicateOperation` when the
    /// composite identity already exists.
    pub fn register(&mut self, spec: RouteSpec) -> Result<&OperationRoute, DispatchError> {
        let key = spec.identity.key();
        if self.routes.contains_key(&key) {
            return Err(DispatchError::DuplicateOperation(key));
        }
        let (methods, path, subpath) = match self.style {
            RouteStyle::Rest => (
                vec![spec.method.unwrap_or(Method::POST)],
                operation_path(&self.base_path, &spec.identity, spec.subpath.as_deref()),
                spec.subpath,
            ),
            RouteStyle::Rpc => (
                vec![Method::GET, Method::POST],
                operation_path(&self.base_path, &spec.identity, None),
                None,
            ),
        };
        info!(
            operation = %key,
            path = %path,
            methods = ?methods,
            style = ?self.style,
            "operation registered"
        );
        let route = OperationRoute {
            identity: spec.identity,
            methods,
            path,
            subpath,
            scope: spec.scope,
            cache: spec.cache,
            schema: spec.schema,
        };
        Ok(self.routes.entry(key).or_insert(route))
    }

    /// True iff the identity is registered in this process.
    pub fn is_local(&self, identity: &OperationIdentity) -> bool {
        self.routes.contains_key(&identity.key())
    }

    pub fn lookup(&self, identity: &OperationIdentity) -> Option<&OperationRoute> {
        self.routes.get(&identity.key())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
