use std::time::Duration;

use crate::dispatcher::{OperationRequest, OperationResponse};

pub trait Middleware: Send + Sync {
    fn before(&self, _req: &OperationRequest) -> Option<OperationResponse> {
        None
    }
    fn after(&self, _req: &OperationRequest, _res: &mut OperationResponse, _latency: Duration) {}
}
