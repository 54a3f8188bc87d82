use std::time::Duration;

use tracing::{debug, info};

use super::Middleware;
use crate::dispatcher::{OperationRequest, OperationResponse};

/// Structured log events around handler execution, keyed by correlation id.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &OperationRequest) -> Option<OperationResponse> {
        debug!(
            correlation_id = %req.correlation_id,
            operation = %req.operation,
            method = %req.method,
            "operation start"
        );
        None
    }

    fn after(&self, req: &OperationRequest, res: &mut OperationResponse, latency: Duration) {
        info!(
            correlation_id = %req.correlation_id,
            operation = %req.operation,
            status = res.status,
            latency_ms = latency.as_millis() as u64,
            "operation complete"
        );
    }
}
