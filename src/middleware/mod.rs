//! Dispatcher-level middleware.
//!
//! Middleware wraps handler execution inside the dispatch pipeline: `before`
//! runs ahead of the handler and may short-circuit with an early response,
//! `after` observes and may amend the response. Middleware here is for
//! cross-cutting observation (metrics, tracing); payload-transforming
//! pipelines belong in [`crate::chain`].

mod core;
mod metrics;
mod tracing;

pub use self::core::Middleware;
pub use self::metrics::MetricsMiddleware;
pub use self::tracing::TracingMiddleware;
