use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed correlation identifier backed by ULID.
///
/// One `CorrelationId` accompanies a request through every nested dispatch
/// call so log lines from different services can be stitched together.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct CorrelationId(pub ulid::Ulid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Attempt to parse from an `x-request-id` header value; if the header is
    /// missing or not a valid ULID, generate a fresh id.
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<CorrelationId>().ok())
            .unwrap_or_default()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CorrelationId(ulid::Ulid::from_string(s)?))
    }
}
