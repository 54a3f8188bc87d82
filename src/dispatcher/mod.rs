//! Operation dispatch.
//!
//! The [`Dispatcher`] owns the route registry and one long-lived coroutine
//! per registered operation, fed through an mpsc channel. [`Dispatcher::call`]
//! takes a short operation reference and routes it: names in the local
//! registry run the full in-process pipeline (auth, validation, caching,
//! middleware, handler), everything else goes over the transport to the
//! gateway. Callers block on a per-request reply channel, so a `call` reads
//! like a plain function call from handler code.

mod core;

pub use self::core::{
    CallTarget, Dispatcher, HandlerRegistry, HandlerSender, HeaderVec, Operation,
    OperationRequest, OperationResponse, ParamVec, MAX_INLINE_HEADERS,
};
