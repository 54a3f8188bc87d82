//! Per-call invocation context.
//!
//! The context is an immutable value captured once at the start of an inbound
//! request and passed explicitly into every nested dispatch or chain call.
//! It is deliberately not an ambient slot: on a cooperative scheduler a
//! shared mutable cell leaks correlation ids and authorization tokens between
//! interleaved requests.

use crate::ids::CorrelationId;

/// Inbound/outbound header carrying the correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";
/// Inbound/outbound header carrying the bearer token.
pub const AUTHORIZATION: &str = "authorization";

/// Ambient state for one invocation: correlation id plus the caller's
/// authorization token. Cheap to clone; copied by value into nested calls and
/// discarded at request end.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub correlation_id: CorrelationId,
    pub authorization: Option<String>,
}

impl InvocationContext {
    /// Fresh context with a generated correlation id and no authorization.
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            authorization: None,
        }
    }

    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    /// Capture context from inbound headers. A missing or malformed
    /// `x-request-id` yields a freshly generated correlation id.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request_id = None;
        let mut authorization = None;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(X_REQUEST_ID) {
                request_id = Some(value);
            } else if name.eq_ignore_ascii_case(AUTHORIZATION) {
                authorization = Some(value.to_string());
            }
        }
        Self {
            correlation_id: CorrelationId::from_header_or_new(request_id),
            authorization,
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_id_and_authorization_from_headers() {
        let id = CorrelationId::new().to_string();
        let headers = [
            ("X-Request-Id", id.as_str()),
            ("Authorization", "Bearer abc"),
        ];
        let ctx = InvocationContext::from_headers(headers);
        assert_eq!(ctx.correlation_id.to_string(), id);
        assert_eq!(ctx.authorization.as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn generates_id_when_header_is_absent_or_invalid() {
        let ctx = InvocationContext::from_headers([("authorization", "t")]);
        assert!(!ctx.correlation_id.to_string().is_empty());

        let ctx = InvocationContext::from_headers([("x-request-id", "not-a-ulid")]);
        assert!(!ctx.correlation_id.to_string().is_empty());
    }
}
