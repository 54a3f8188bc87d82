//! # opdispatch
//!
//! **opdispatch** is a coroutine-powered operation dispatch runtime for
//! microservices, built on the `may` runtime. Services register named
//! operations; callers invoke them through short `service:version:operation`
//! references and get the same behavior whether the operation lives in the
//! current process or behind a remote gateway.
//!
//! ## Overview
//!
//! Each registered operation runs in its own long-lived coroutine, fed
//! through an mpsc channel. A [`dispatcher::Dispatcher::call`] resolves the
//! reference, threads correlation and authorization headers from an explicit
//! [`context::InvocationContext`], and routes locally (full pipeline: auth,
//! schema validation, caching, middleware) or remotely over the configured
//! transport. Results come back as JSON values; failures use a uniform
//! `{ok, error, data}` envelope.
//!
//! ## Architecture
//!
//! - **[`resolver`]** - Short operation reference parsing
//! - **[`registry`]** - Local operation routes (REST and RPC styles)
//! - **[`dispatcher`]** - Coroutine-based dispatch, local pipeline, remote calls
//! - **[`chain`]** - Typed step pipelines built from a step registry
//! - **[`cache`]** - Fingerprint-keyed response caching
//! - **[`middleware`]** - Metrics and tracing around handler execution
//! - **[`security`]** - Token authentication and scope enforcement
//! - **[`transport`]** / **[`gateway`]** - HTTP egress and gateway addressing
//! - **[`validator`]** - JSON Schema payload validation
//! - **[`config`]** - YAML service configuration and runtime tuning
//! - **[`envelope`]** / **[`error`]** - Response envelopes and error types
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use opdispatch::config::ServiceConfig;
//! use opdispatch::context::InvocationContext;
//! use opdispatch::dispatcher::{CallTarget, Dispatcher, Operation, OperationResponse};
//! use opdispatch::transport::HttpTransport;
//! use serde_json::json;
//!
//! let config = ServiceConfig::default();
//! let mut dispatcher = Dispatcher::new(&config, Arc::new(HttpTransport::new()));
//!
//! unsafe {
//!     dispatcher
//!         .add(Operation::new("hello", |req| {
//!             let name = req.field("name").cloned().unwrap_or(json!("world"));
//!             req.reply(OperationResponse::ok(json!({ "greeting": name })));
//!         }))
//!         .unwrap();
//! }
//!
//! let ctx = InvocationContext::new();
//! let target = CallTarget::new("service:hello");
//! let result = dispatcher.call(&ctx, &target, json!({ "name": "ferris" })).unwrap();
//! ```

pub mod cache;
pub mod chain;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod security;
pub mod transport;
pub mod validator;

pub use context::InvocationContext;
pub use dispatcher::{CallTarget, Dispatcher, Operation, OperationRequest, OperationResponse};
pub use error::DispatchError;
pub use ids::CorrelationId;
pub use resolver::OperationIdentity;
