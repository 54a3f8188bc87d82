//! # Response Cache
//!
//! Fingerprint-keyed caching of operation results. A cacheable operation
//! consults its named cache before the handler runs and refreshes the entry
//! afterwards:
//!
//! 1. The effective payload (body, path params and query params merged) is
//!    hashed with [`fingerprint`]; a policy-supplied key generator may prefix
//!    the key.
//! 2. A `no-store` directive in the inbound `cache-control` header bypasses
//!    the read but NOT the write: the handler runs and the fresh result still
//!    replaces the stored entry.
//! 3. After the handler runs, non-error results are written back. Store
//!    failures are logged and swallowed; caching is best-effort.
//!
//! There is no single-flight de-duplication: concurrent requests that miss on
//! the same key each run the handler, and the later write wins.

mod fingerprint;
mod store;

use std::sync::Arc;

use serde_json::Value;

pub use fingerprint::fingerprint;
pub use store::{
    BoundedStore, CacheEntry, CacheManager, CacheOptions, CacheStore, CacheStoreError,
    MemoryStore,
};

/// Header naming the cache a pending result should be stored into.
pub const MB_CACHE: &str = "mb-cache";
/// Header carrying the computed key for a pending store.
pub const MB_CACHE_KEY: &str = "mb-cache-key";
/// Standard cache-control header, inspected for the `no-store` directive.
pub const CACHE_CONTROL: &str = "cache-control";

/// Derives the policy-specific prefix of a cache key from the effective
/// payload.
pub type KeyGenerator = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Caching policy attached to an operation registration. Policies sharing a
/// `name` share the underlying store.
#[derive(Clone, Default)]
pub struct CachePolicy {
    /// Cache name; defaults to the operation's full name when registered.
    pub name: Option<String>,
    /// Optional key prefix derivation.
    pub key_generator: Option<KeyGenerator>,
    /// Store construction options, honored only by the first `create` for a
    /// given name.
    pub options: CacheOptions,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn key_generator(
        mut self,
        generator: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.options.max_entries = Some(max_entries);
        self
    }
}

impl std::fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePolicy")
            .field("name", &self.name)
            .field("has_key_generator", &self.key_generator.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Build the cache key for an effective payload:
/// `keygen(payload) + ":" + fingerprint(payload)` when a key generator is
/// present, else just the fingerprint.
pub fn cache_key(key_generator: Option<&KeyGenerator>, payload: &Value) -> String {
    match key_generator {
        Some(generator) => format!("{}:{}", generator(payload), fingerprint(payload)),
        None => fingerprint(payload),
    }
}

/// True when a `cache-control` header value carries a `no-store` directive.
pub fn has_no_store(cache_control: Option<&str>) -> bool {
    cache_control
        .map(|value| {
            value
                .split(',')
                .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_with_generator_is_prefixed() {
        let policy = CachePolicy::new().key_generator(|p| {
            p.get("id").and_then(Value::as_str).unwrap_or("?").to_string()
        });
        let payload = json!({ "id": "p1", "depth": 2 });
        let key = cache_key(policy.key_generator.as_ref(), &payload);
        assert!(key.starts_with("p1:"));
        assert!(key.ends_with(&fingerprint(&payload)));
    }

    #[test]
    fn key_without_generator_is_the_fingerprint() {
        let payload = json!({ "id": "p1" });
        assert_eq!(cache_key(None, &payload), fingerprint(&payload));
    }

    #[test]
    fn no_store_directive_detection() {
        assert!(has_no_store(Some("no-store")));
        assert!(has_no_store(Some("max-age=0, No-Store")));
        assert!(!has_no_store(Some("no-cache")));
        assert!(!has_no_store(None));
    }
}
