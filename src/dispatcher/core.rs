use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use smallvec::SmallVec;
use tracing::{debug, error, info, warn};

use crate::cache::{self, CacheEntry, CacheManager, CacheOptions, CachePolicy, CacheStore};
use crate::config::{RuntimeConfig, ServiceConfig};
use crate::context::{InvocationContext, AUTHORIZATION, X_REQUEST_ID};
use crate::envelope;
use crate::error::DispatchError;
use crate::gateway::{GatewayResolver, StaticGatewayResolver};
use crate::ids::CorrelationId;
use crate::middleware::{MetricsMiddleware, Middleware};
use crate::registry::{operation_path, CacheBinding, Registry, RouteSpec};
use crate::resolver::{self, OperationIdentity};
use crate::security::{Authenticator, Identity};
use crate::transport::{Transport, TransportError};
use crate::validator::PayloadSchema;

/// Maximum inline headers/params before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the dispatch hot path. Header names
/// use `Arc<str>` because they repeat across requests; values are per-request
/// data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated path/query parameter storage.
pub type ParamVec = SmallVec<[(Arc<str>, String); 8]>;

/// Request delivered to a handler coroutine.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Correlation id threaded from the invocation context.
    pub correlation_id: CorrelationId,
    /// Full operation name, `service:version:operation`.
    pub operation: String,
    /// Method the operation is exposed under.
    pub method: Method,
    /// Effective payload: body, path params and query params merged.
    pub payload: Value,
    /// Effective headers, including the cache markers when a store is pending.
    pub headers: HeaderVec,
    /// Authenticated caller, when an authenticator is configured.
    pub identity: Option<Identity>,
    /// Channel for sending the response back to the dispatcher.
    pub reply_tx: mpsc::Sender<OperationResponse>,
}

impl OperationRequest {
    /// Get a header by name (case-insensitive).
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    /// Get a field of the effective payload.
    #[inline]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Send the response back to the dispatcher. A dropped receiver means
    /// the caller gave up; nothing to do then.
    pub fn reply(&self, response: OperationResponse) {
        let _ = self.reply_tx.send(response);
    }
}

/// Response produced by a handler.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub payload: Value,
}

impl OperationResponse {
    /// JSON response with the given status.
    pub fn json(status: u16, payload: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            payload,
        }
    }

    /// 200 response with the given payload.
    pub fn ok(payload: Value) -> Self {
        Self::json(200, payload)
    }

    /// Failure envelope response (`{ok:false, error, data}`).
    pub fn failure(status: u16, code: &str, data: Option<Value>) -> Self {
        Self::json(status, envelope::failure(code, data))
    }

    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    pub fn set_header(&mut self, name: &str, value: String) {
        header_set(&mut self.headers, name, value);
    }

    /// Error responses are returned but never cached.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Type alias for a channel sender feeding a handler coroutine.
pub type HandlerSender = mpsc::Sender<OperationRequest>;

type HandlerFn = Box<dyn Fn(OperationRequest) + Send>;

/// Definition of one operation to register: metadata plus its handler.
///
/// The operation's identity is completed with the owning service's name and
/// version at registration time.
pub struct Operation {
    pub name: String,
    pub method: Option<Method>,
    /// REST subpath appended after the operation segment, e.g. `/{id}`.
    pub path: Option<String>,
    /// Required scope; falls back to the configured default scope.
    pub scope: Option<String>,
    pub cache: Option<CachePolicy>,
    /// JSON Schema the effective payload must satisfy.
    pub schema: Option<Value>,
    handler: HandlerFn,
}

impl Operation {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(OperationRequest) + Send + 'static,
    {
        Self {
            name: name.into(),
            method: None,
            path: None,
            scope: None,
            cache: None,
            schema: None,
            handler: Box::new(handler),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Target of a programmatic dispatch call.
#[derive(Debug, Clone)]
pub struct CallTarget {
    /// Short operation reference, 1-3 `:`-separated segments.
    pub name: String,
    pub method: Option<Method>,
    /// Subpath appended to the operation URL. For local dispatch its query
    /// string becomes query parameters and its leading segments resolve the
    /// `{name}` placeholders of the route's declared subpath into path
    /// parameters.
    pub path: Option<String>,
    /// Explicit headers, overriding the context-derived ones.
    pub headers: Vec<(String, String)>,
    /// Remote call timeout; falls back to the configured gateway timeout.
    pub timeout: Option<Duration>,
}

impl CallTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: None,
            path: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Explicit name-to-handler registry backing directory-based operation
/// discovery. Populated once at startup; a definition file names its handler
/// through this mapping instead of loading code by path.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Fn(OperationRequest) + Send + Sync>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(OperationRequest) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Fn(OperationRequest) + Send + Sync>> {
        self.handlers.get(name).map(Arc::clone)
    }
}

/// One operation definition file: metadata only, the handler is resolved
/// through a [`HandlerRegistry`] by operation name.
#[derive(Debug, Deserialize)]
struct OperationDefinition {
    /// Defaults to the file's base name when absent.
    name: Option<String>,
    method: Option<String>,
    path: Option<String>,
    scope: Option<String>,
    cache: Option<CacheDefinition>,
    schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CacheDefinition {
    name: Option<String>,
    max_entries: Option<usize>,
}

fn discovery_error(path: &Path, reason: impl Display) -> DispatchError {
    DispatchError::OperationDiscovery {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Dispatch router: registers operations, runs the local invoke pipeline and
/// routes `call`s to either an in-process handler or the remote gateway.
pub struct Dispatcher {
    service_name: String,
    service_version: String,
    registry: Registry,
    caches: Arc<CacheManager>,
    handlers: HashMap<String, HandlerSender>,
    middlewares: Vec<Arc<dyn Middleware>>,
    metrics: Option<Arc<MetricsMiddleware>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    default_scope: Option<String>,
    gateway: Arc<dyn GatewayResolver>,
    gateway_path: String,
    transport: Arc<dyn Transport>,
    remote_timeout: Duration,
    stack_size: usize,
}

impl Dispatcher {
    pub fn new(config: &ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        let runtime = RuntimeConfig::from_env();
        Self {
            service_name: config.service.name.clone(),
            service_version: config.service.version.clone(),
            registry: Registry::new(config.service.style, config.service.path.clone()),
            caches: Arc::new(CacheManager::new()),
            handlers: HashMap::new(),
            middlewares: Vec::new(),
            metrics: None,
            authenticator: None,
            default_scope: config.auth.scope.clone(),
            gateway: Arc::new(StaticGatewayResolver::from_host_port(
                &config.gateway.host,
                config.gateway.port,
            )),
            gateway_path: config.gateway.path.clone(),
            transport,
            remote_timeout: config.gateway.timeout(),
            stack_size: runtime.stack_size,
        }
    }

    /// Replace the static gateway resolver with a pluggable one (service
    /// discovery, per-service overrides).
    pub fn set_gateway_resolver(&mut self, resolver: Arc<dyn GatewayResolver>) {
        self.gateway = resolver;
    }

    pub fn set_authenticator(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticator = Some(authenticator);
    }

    /// Add middleware to the pipeline; executed in registration order around
    /// every handler invocation.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Install the metrics middleware, both into the pipeline and as the
    /// sink for cache and auth counters.
    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.middlewares
            .push(Arc::clone(&metrics) as Arc<dyn Middleware>);
        self.metrics = Some(metrics);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    /// Register an operation under this service's name and version.
    ///
    /// Fails with `DuplicateOperation` when the composite identity already
    /// exists (the new handler is never reachable), creates the named cache
    /// if the registration carries a cache policy, and spawns the handler
    /// coroutine. Registration failures are meant to be fatal at startup.
    ///
    /// # Safety
    ///
    /// Spawns a coroutine via `may::coroutine::Builder::spawn()`, which is
    /// unsafe in the `may` runtime. The caller must ensure the May runtime is
    /// initialized; registration is expected to happen during startup.
    pub unsafe fn add(&mut self, operation: Operation) -> Result<(), DispatchError> {
        let identity = OperationIdentity::new(
            self.service_name.clone(),
            self.service_version.clone(),
            operation.name.clone(),
        );
        let key = identity.key();
        if self.registry.is_local(&identity) {
            return Err(DispatchError::DuplicateOperation(key));
        }

        // Compile the schema first so a broken registration never
        // half-applies.
        let schema = operation
            .schema
            .as_ref()
            .map(PayloadSchema::compile)
            .transpose()?
            .map(Arc::new);

        let cache = operation.cache.map(|policy| {
            let name = policy.name.unwrap_or_else(|| key.clone());
            self.caches.create(&name, &policy.options);
            CacheBinding {
                name,
                key_generator: policy.key_generator,
            }
        });

        self.registry.register(RouteSpec {
            identity,
            method: operation.method,
            subpath: operation.path,
            scope: operation.scope,
            cache,
            schema,
        })?;
        self.spawn_handler(&key, operation.handler);
        info!(operation = %key, total_operations = self.registry.len(), "operation added");
        Ok(())
    }

    /// Register every operation in a module; stops at the first failure.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Dispatcher::add`].
    pub unsafe fn add_module<I>(&mut self, operations: I) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = Operation>,
    {
        for operation in operations {
            self.add(operation)?;
        }
        Ok(())
    }

    /// Register one operation per definition file (`*.yaml`/`*.yml`) found in
    /// `dir`, in lexical order. The operation name defaults to the file's
    /// base name; handlers are resolved by that name through `handlers`.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Dispatcher::add`].
    pub unsafe fn add_operations(
        &mut self,
        dir: &Path,
        handlers: &HandlerRegistry,
    ) -> Result<(), DispatchError> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| discovery_error(dir, e))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        files.sort();

        for file in files {
            let raw = std::fs::read_to_string(&file).map_err(|e| discovery_error(&file, e))?;
            let definition: OperationDefinition =
                serde_yaml::from_str(&raw).map_err(|e| discovery_error(&file, e))?;
            let name = definition
                .name
                .or_else(|| {
                    file.file_stem()
                        .and_then(|stem| stem.to_str())
                        .map(str::to_string)
                })
                .ok_or_else(|| discovery_error(&file, "operation name is undecidable"))?;
            let handler = handlers
                .get(&name)
                .ok_or_else(|| discovery_error(&file, format!("no handler named `{name}`")))?;

            let mut operation =
                Operation::new(name, move |req: OperationRequest| handler(req));
            if let Some(method) = definition.method {
                operation.method = Some(
                    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                        .map_err(|e| discovery_error(&file, e))?,
                );
            }
            operation.path = definition.path;
            operation.scope = definition.scope;
            operation.cache = definition.cache.map(|cache| CachePolicy {
                name: cache.name,
                key_generator: None,
                options: CacheOptions {
                    max_entries: cache.max_entries,
                },
            });
            operation.schema = definition.schema;
            self.add(operation)?;
        }
        Ok(())
    }

    unsafe fn spawn_handler(&mut self, key: &str, handler: HandlerFn) {
        let (tx, rx) = mpsc::channel::<OperationRequest>();
        let operation = key.to_string();
        let stack_size = self.stack_size;

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the
        // may runtime. The handler is Send + 'static, replies travel through
        // the per-request channel, and spawning happens at startup when the
        // runtime is initialized.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(operation = %operation, stack_size, "handler coroutine start");
                    for req in rx.iter() {
                        let reply_tx = req.reply_tx.clone();
                        let correlation_id = req.correlation_id;
                        let started = Instant::now();
                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                handler(req);
                            }))
                        {
                            let message = format!("{panic:?}");
                            error!(
                                correlation_id = %correlation_id,
                                operation = %operation,
                                panic = %message,
                                "handler panicked"
                            );
                            let _ = reply_tx.send(OperationResponse::failure(
                                500,
                                "handler_panicked",
                                Some(Value::String(message)),
                            ));
                        } else {
                            debug!(
                                correlation_id = %correlation_id,
                                operation = %operation,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "handler returned"
                            );
                        }
                    }
                })
        };

        match spawn_result {
            Ok(_) => {
                self.handlers.insert(key.to_string(), tx);
            }
            Err(e) => {
                error!(operation = %key, error = %e, "failed to spawn handler coroutine");
            }
        }
    }

    /// Invoke an operation by logical name.
    ///
    /// A name present in the registry runs through the same pipeline an
    /// inbound HTTP call would (auth, validation, caching, middleware) and
    /// never touches the transport; anything else is dispatched to the
    /// gateway. Suspends the calling coroutine until the result is ready.
    pub fn call(
        &self,
        ctx: &InvocationContext,
        target: &CallTarget,
        message: Value,
    ) -> Result<Value, DispatchError> {
        let identity = resolver::resolve(&target.name)?;
        let headers = effective_headers(ctx, &target.headers);

        if self.registry.is_local(&identity) {
            debug!(
                correlation_id = %ctx.correlation_id,
                operation = %identity,
                "local dispatch"
            );
            let template = self
                .registry
                .lookup(&identity)
                .and_then(|route| route.subpath.as_deref());
            let path_params = extract_path_params(template, target.path.as_deref());
            let query_params = parse_query(target.path.as_deref());
            let header_vec: HeaderVec = headers
                .iter()
                .map(|(name, value)| (Arc::from(name.as_str()), value.clone()))
                .collect();
            let response = self.invoke(
                &identity,
                Some(message),
                &path_params,
                &query_params,
                header_vec,
                ctx,
            );
            Ok(response.payload)
        } else {
            self.call_remote(ctx, &identity, target, &message, &headers)
        }
    }

    /// Run the full inbound pipeline for a local operation, exactly as the
    /// HTTP wiring does: authentication and scope, schema validation, payload
    /// merge, cache read, middleware, handler, cache refresh.
    ///
    /// Failures come back as envelope responses; this function never errors
    /// out of band.
    pub fn invoke(
        &self,
        identity: &OperationIdentity,
        body: Option<Value>,
        path_params: &ParamVec,
        query_params: &ParamVec,
        headers: HeaderVec,
        ctx: &InvocationContext,
    ) -> OperationResponse {
        let key = identity.key();
        let Some(route) = self.registry.lookup(identity) else {
            error!(operation = %key, "operation not registered");
            return OperationResponse::failure(500, "handler_not_registered", None);
        };

        let mut caller: Option<Identity> = None;
        if let Some(authenticator) = &self.authenticator {
            let token = header_get(&headers, AUTHORIZATION)
                .map(str::to_string)
                .or_else(|| ctx.authorization.clone());
            let Some(token) = token else {
                self.record_auth_failure();
                return OperationResponse::failure(401, "unauthorized", None);
            };
            match authenticator.authenticate(&token) {
                Ok(identity) => {
                    let required = route.scope.as_deref().or(self.default_scope.as_deref());
                    if let Some(required) = required {
                        if !identity.has_scope(required) {
                            self.record_auth_failure();
                            warn!(
                                correlation_id = %ctx.correlation_id,
                                operation = %key,
                                scope = %required,
                                "caller lacks required scope"
                            );
                            return OperationResponse::failure(
                                403,
                                "forbidden",
                                Some(json!({ "scope": required })),
                            );
                        }
                    }
                    caller = Some(identity);
                }
                Err(err) => {
                    self.record_auth_failure();
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        operation = %key,
                        error = %err,
                        "authentication rejected"
                    );
                    return OperationResponse::failure(401, "unauthorized", None);
                }
            }
        }

        let payload = merge_payload(body, path_params, query_params);

        if let Some(schema) = &route.schema {
            if let Err(err) = schema.validate(&payload) {
                return OperationResponse::json(400, envelope::from_error(&err));
            }
        }

        let mut headers = headers;
        let mut pending_store: Option<(Arc<dyn CacheStore>, String)> = None;
        if let Some(binding) = &route.cache {
            if let Some(store) = self.caches.get(&binding.name) {
                let cache_key = cache::cache_key(binding.key_generator.as_ref(), &payload);
                let bypass = cache::has_no_store(header_get(&headers, cache::CACHE_CONTROL));
                if !bypass {
                    match store.get(&cache_key) {
                        Ok(Some(entry)) => {
                            if let Some(metrics) = &self.metrics {
                                metrics.inc_cache_hit();
                            }
                            debug!(
                                correlation_id = %ctx.correlation_id,
                                operation = %key,
                                cache = %binding.name,
                                "cache hit"
                            );
                            return OperationResponse::json(entry.status, entry.payload);
                        }
                        Ok(None) => {
                            if let Some(metrics) = &self.metrics {
                                metrics.inc_cache_miss();
                            }
                        }
                        Err(err) => warn!(
                            correlation_id = %ctx.correlation_id,
                            cache = %binding.name,
                            error = %err,
                            "cache read failed"
                        ),
                    }
                }
                // Mark the pending store. Mirrored into the request headers
                // so wrapping middleware can observe the decision. Bypass
                // skips the read above, never this write.
                header_set(&mut headers, cache::MB_CACHE, binding.name.clone());
                header_set(&mut headers, cache::MB_CACHE_KEY, cache_key.clone());
                pending_store = Some((store, cache_key));
            }
        }

        let method = route.methods.first().cloned().unwrap_or(Method::POST);
        let (reply_tx, reply_rx) = mpsc::channel();
        let request = OperationRequest {
            correlation_id: ctx.correlation_id,
            operation: key.clone(),
            method,
            payload,
            headers,
            identity: caller,
            reply_tx,
        };

        let mut early: Option<OperationResponse> = None;
        for mw in &self.middlewares {
            if early.is_none() {
                early = mw.before(&request);
            } else {
                mw.before(&request);
            }
        }

        let (mut response, latency) = if let Some(response) = early {
            (response, Duration::from_millis(0))
        } else {
            let Some(tx) = self.handlers.get(&key) else {
                error!(operation = %key, "no handler coroutine for registered operation");
                return OperationResponse::failure(500, "handler_not_registered", None);
            };
            let started = Instant::now();
            if tx.send(request.clone()).is_err() {
                error!(
                    correlation_id = %ctx.correlation_id,
                    operation = %key,
                    "failed to send request to handler"
                );
                return OperationResponse::failure(503, "handler_unavailable", None);
            }
            match reply_rx.recv() {
                Ok(response) => (response, started.elapsed()),
                Err(err) => {
                    error!(
                        correlation_id = %ctx.correlation_id,
                        operation = %key,
                        error = %err,
                        "handler channel closed"
                    );
                    return OperationResponse::failure(503, "handler_unavailable", None);
                }
            }
        };

        for mw in &self.middlewares {
            mw.after(&request, &mut response, latency);
        }

        // Best-effort cache refresh; errors are logged and swallowed.
        if let Some((store, cache_key)) = pending_store {
            if !response.is_error() {
                let entry = CacheEntry {
                    status: response.status,
                    payload: response.payload.clone(),
                };
                if let Err(err) = store.set(&cache_key, entry) {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        operation = %key,
                        error = %err,
                        "cache write failed"
                    );
                }
            }
        }

        response
    }

    fn call_remote(
        &self,
        ctx: &InvocationContext,
        identity: &OperationIdentity,
        target: &CallTarget,
        message: &Value,
        headers: &[(String, String)],
    ) -> Result<Value, DispatchError> {
        let url = format!(
            "{}{}",
            self.gateway.base_url(identity),
            operation_path(&self.gateway_path, identity, target.path.as_deref())
        );
        let method = target.method.clone().unwrap_or(Method::POST);
        let timeout = target.timeout.unwrap_or(self.remote_timeout);
        debug!(
            correlation_id = %ctx.correlation_id,
            operation = %identity,
            url = %url,
            method = %method,
            "remote dispatch"
        );

        let body = serde_json::to_vec(message).map_err(|e| {
            DispatchError::handler("serialize_error", Some(Value::String(e.to_string())))
        })?;
        let response = self
            .transport
            .send(&method, &url, headers, &body, timeout)
            .map_err(|source| {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    operation = %identity,
                    url = %url,
                    error = %source,
                    "remote call failed"
                );
                DispatchError::RemoteCallFailed {
                    url: url.clone(),
                    source,
                }
            })?;

        if response.is_json() {
            if response.body.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&response.body).map_err(|e| DispatchError::RemoteCallFailed {
                url,
                source: TransportError::Other(format!("invalid json body: {e}")),
            })
        } else {
            Ok(Value::String(
                String::from_utf8_lossy(&response.body).into_owned(),
            ))
        }
    }

    fn record_auth_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_auth_failure();
        }
    }
}

/// Effective headers for a dispatch call: correlation id and authorization
/// from the context, overridden by any explicitly passed headers.
fn effective_headers(
    ctx: &InvocationContext,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut headers = vec![(X_REQUEST_ID.to_string(), ctx.correlation_id.to_string())];
    if let Some(authorization) = &ctx.authorization {
        headers.push((AUTHORIZATION.to_string(), authorization.clone()));
    }
    for (name, value) in overrides {
        if let Some(existing) = headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            existing.1 = value.clone();
        } else {
            headers.push((name.clone(), value.clone()));
        }
    }
    headers
}

/// Merge body, path parameters and query parameters into the effective
/// payload. Later sources win on key collision (last-write-wins); a
/// non-object body lands under `"body"`.
fn merge_payload(body: Option<Value>, path_params: &ParamVec, query_params: &ParamVec) -> Value {
    let mut map = match body {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("body".to_string(), other);
            map
        }
    };
    for (name, value) in path_params.iter().chain(query_params.iter()) {
        map.insert(name.to_string(), Value::String(value.clone()));
    }
    Value::Object(map)
}

/// Path parameters from a call target subpath, resolved against the route's
/// declared template: `/{id}` zipped with `/42` yields `id=42`. Literal
/// template segments capture nothing.
fn extract_path_params(template: Option<&str>, subpath: Option<&str>) -> ParamVec {
    let mut params = ParamVec::new();
    let (Some(template), Some(subpath)) = (template, subpath) else {
        return params;
    };
    let path = subpath.split('?').next().unwrap_or("");
    let segments = template
        .trim_matches('/')
        .split('/')
        .zip(path.trim_matches('/').split('/'));
    for (pattern, value) in segments {
        let capture = pattern
            .strip_prefix('{')
            .and_then(|pattern| pattern.strip_suffix('}'));
        if let Some(name) = capture {
            if !value.is_empty() {
                params.push((Arc::from(name), value.to_string()));
            }
        }
    }
    params
}

/// Query parameters from a call target subpath, e.g. `/search?limit=10`.
fn parse_query(subpath: Option<&str>) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some(query) = subpath.and_then(|p| p.split_once('?').map(|(_, q)| q)) {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.push((Arc::from(name.as_ref()), value.into_owned()));
        }
    }
    params
}

fn header_get<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn header_set(headers: &mut HeaderVec, name: &str, value: String) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((Arc::from(name), value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_headers_override_context_headers() {
        let ctx = InvocationContext::new().with_authorization("Bearer original");
        let overrides = vec![
            ("Authorization".to_string(), "Bearer override".to_string()),
            ("x-extra".to_string(), "1".to_string()),
        ];
        let headers = effective_headers(&ctx, &overrides);
        assert_eq!(headers.len(), 3);
        let auth = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION))
            .map(|(_, value)| value.as_str());
        assert_eq!(auth, Some("Bearer override"));
    }

    #[test]
    fn merge_is_last_write_wins() {
        let mut path_params = ParamVec::new();
        path_params.push((Arc::from("id"), "from-path".to_string()));
        let mut query_params = ParamVec::new();
        query_params.push((Arc::from("id"), "from-query".to_string()));
        let merged = merge_payload(
            Some(json!({ "id": "from-body", "name": "n" })),
            &path_params,
            &query_params,
        );
        assert_eq!(merged["id"], "from-query");
        assert_eq!(merged["name"], "n");
    }

    #[test]
    fn path_params_resolve_against_the_template() {
        let params = extract_path_params(Some("/{id}/items/{item}"), Some("/42/items/7?x=1"));
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], (Arc::from("id"), "42".to_string()));
        assert_eq!(params[1], (Arc::from("item"), "7".to_string()));

        // No template, no captures.
        assert!(extract_path_params(None, Some("/42")).is_empty());
        // Missing trailing segments capture nothing.
        assert!(extract_path_params(Some("/{id}"), Some("/")).is_empty());
    }

    #[test]
    fn query_params_parse_from_subpath() {
        let params = parse_query(Some("/search?limit=10&q=a%20b"));
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].1, "10");
        assert_eq!(params[1].1, "a b");
    }
}
