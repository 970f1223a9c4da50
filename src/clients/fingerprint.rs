//! In-flight request tracking.
//!
//! Every cancelable request is identified by a [`Fingerprint`] derived from
//! its method, URL, query and body. The [`FingerprintRegistry`] keeps one
//! [`CancelToken`] per fingerprint: registering a duplicate cancels the
//! request that was already in flight.
//!
//! # Example
//!
//! ```rust
//! use request_layer::{FingerprintRegistry, HttpMethod, RequestDescriptor};
//!
//! let registry = FingerprintRegistry::new();
//! let request = RequestDescriptor::builder(HttpMethod::Get, "/users").build().unwrap();
//!
//! let first = registry.begin_tracking(&request);
//! let second = registry.begin_tracking(&request);
//!
//! assert!(first.token().is_cancelled());
//! assert!(!second.token().is_cancelled());
//! assert_eq!(registry.len(), 1);
//!
//! // The superseded request settling late leaves its successor alone.
//! assert!(!registry.end_tracking(&first));
//! assert!(registry.end_tracking(&second));
//! assert!(registry.is_empty());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::clients::http_request::RequestDescriptor;

/// Reason given to a request replaced by an identical newer one.
pub const SUPERSEDED_REASON: &str = "superseded by duplicate request";

/// Reason given to requests canceled through `cancel_all`.
pub const BULK_CANCEL_REASON: &str = "bulk cancellation";

const DEFAULT_CANCEL_REASON: &str = "request cancelled";

/// Stable identity of a request, used to detect duplicates.
///
/// The digest covers the method, the URL as given by the caller, the query
/// parameters (sorted by key) and the serialized body. Headers and per-call
/// options are not part of the identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    #[must_use]
    pub fn of(request: &RequestDescriptor) -> Self {
        let query = serde_json::to_string(&request.query).unwrap_or_default();
        let body = request
            .body
            .as_ref()
            .map_or_else(String::new, serde_json::Value::to_string);

        let mut hasher = Sha256::new();
        for part in [
            request.method.as_str(),
            request.url.as_str(),
            query.as_str(),
            body.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }

        Self(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle used to cancel an in-flight request.
///
/// Clones share state: canceling any clone cancels them all. The first
/// reason recorded wins.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl CancelToken {
    /// Creates a token that has not been canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token with the given reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.token.cancel();
    }

    /// Returns `true` once the token has been canceled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the token is canceled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns the cancellation reason.
    #[must_use]
    pub fn reason(&self) -> String {
        self.reason
            .get()
            .map_or_else(|| DEFAULT_CANCEL_REASON.to_string(), Clone::clone)
    }
}

/// Registration returned by [`FingerprintRegistry::begin_tracking`].
#[derive(Debug)]
pub struct TrackedRequest {
    fingerprint: Fingerprint,
    id: u64,
    token: CancelToken,
}

impl TrackedRequest {
    /// The fingerprint this request was registered under.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The token the transport should observe.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }
}

#[derive(Debug)]
struct InFlightEntry {
    id: u64,
    token: CancelToken,
}

/// Registry of in-flight cancelable requests, one entry per fingerprint.
///
/// The registry is shared by all concurrent calls of one client. Its lock is
/// only taken for synchronous map updates and never held across an await.
#[derive(Debug, Default)]
pub struct FingerprintRegistry {
    entries: Mutex<HashMap<Fingerprint, InFlightEntry>>,
    next_id: AtomicU64,
}

// Verify FingerprintRegistry is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FingerprintRegistry>();
};

impl FingerprintRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Fingerprint, InFlightEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a request, canceling any in-flight duplicate first.
    pub fn begin_tracking(&self, request: &RequestDescriptor) -> TrackedRequest {
        let fingerprint = Fingerprint::of(request);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();

        let mut entries = self.entries();
        if let Some(stale) = entries.remove(&fingerprint) {
            tracing::debug!(
                "Cancelling duplicate {} {} ({})",
                request.method,
                request.url,
                fingerprint
            );
            stale.token.cancel(SUPERSEDED_REASON);
        }
        entries.insert(
            fingerprint.clone(),
            InFlightEntry {
                id,
                token: token.clone(),
            },
        );
        drop(entries);

        TrackedRequest {
            fingerprint,
            id,
            token,
        }
    }

    /// Removes the registration of a settled request.
    ///
    /// Returns `true` if an entry was removed. Entries that already belong to
    /// a newer duplicate are left in place.
    pub fn end_tracking(&self, tracked: &TrackedRequest) -> bool {
        let mut entries = self.entries();
        match entries.get(&tracked.fingerprint) {
            Some(entry) if entry.id == tracked.id => {
                entries.remove(&tracked.fingerprint);
                true
            }
            _ => false,
        }
    }

    /// Cancels every in-flight request and clears the registry.
    ///
    /// Returns the number of requests that were canceled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<InFlightEntry> = self.entries().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            entry.token.cancel(BULK_CANCEL_REASON);
        }
        drained.len()
    }

    /// Returns the number of in-flight requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if no request is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Returns `true` if a request with this fingerprint is in flight.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries().contains_key(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http_request::HttpMethod;
    use serde_json::json;

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::builder(HttpMethod::Get, url).build().unwrap()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = RequestDescriptor::builder(HttpMethod::Get, "/users")
            .query_param("id", 1)
            .query_param("page", 2)
            .build()
            .unwrap();
        let b = RequestDescriptor::builder(HttpMethod::Get, "/users")
            .query_param("page", 2)
            .query_param("id", 1)
            .build()
            .unwrap();

        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_fingerprint_ignores_headers_and_options() {
        let a = RequestDescriptor::builder(HttpMethod::Get, "/users")
            .header("X-Trace", "1")
            .retry(3)
            .build()
            .unwrap();

        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&get("/users")));
    }

    #[test]
    fn test_fingerprint_distinguishes_method_url_query_and_body() {
        let base = Fingerprint::of(&get("/users"));

        let other_url = Fingerprint::of(&get("/users/1"));
        let other_method = Fingerprint::of(
            &RequestDescriptor::builder(HttpMethod::Delete, "/users")
                .build()
                .unwrap(),
        );
        let other_query = Fingerprint::of(
            &RequestDescriptor::builder(HttpMethod::Get, "/users")
                .query_param("id", 1)
                .build()
                .unwrap(),
        );
        let with_body = Fingerprint::of(
            &RequestDescriptor::builder(HttpMethod::Get, "/users")
                .body(json!({"id": 1}))
                .build()
                .unwrap(),
        );

        assert_ne!(base, other_url);
        assert_ne!(base, other_method);
        assert_ne!(base, other_query);
        assert_ne!(base, with_body);
    }

    #[test]
    fn test_cancel_token_keeps_first_reason() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), "request cancelled");

        let clone = token.clone();
        clone.cancel("first");
        token.cancel("second");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), "first");
    }

    #[test]
    fn test_duplicate_registration_cancels_previous() {
        let registry = FingerprintRegistry::new();
        let request = get("/users");

        let first = registry.begin_tracking(&request);
        let second = registry.begin_tracking(&request);

        assert!(first.token().is_cancelled());
        assert_eq!(first.token().reason(), SUPERSEDED_REASON);
        assert!(!second.token().is_cancelled());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(second.fingerprint()));
    }

    #[test]
    fn test_end_tracking_is_idempotent() {
        let registry = FingerprintRegistry::new();
        let tracked = registry.begin_tracking(&get("/users"));

        assert!(registry.end_tracking(&tracked));
        assert!(!registry.end_tracking(&tracked));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_distinct_requests_are_tracked_independently() {
        let registry = FingerprintRegistry::new();
        let a = registry.begin_tracking(&get("/users"));
        let b = registry.begin_tracking(&get("/orders"));

        assert!(!a.token().is_cancelled());
        assert!(!b.token().is_cancelled());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_cancel_all_cancels_and_clears() {
        let registry = FingerprintRegistry::new();
        let a = registry.begin_tracking(&get("/users"));
        let b = registry.begin_tracking(&get("/orders"));

        assert_eq!(registry.cancel_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(a.token().reason(), BULK_CANCEL_REASON);
        assert_eq!(b.token().reason(), BULK_CANCEL_REASON);
    }

    #[test]
    fn test_cancel_all_on_empty_registry_is_noop() {
        let registry = FingerprintRegistry::new();
        assert_eq!(registry.cancel_all(), 0);
        assert_eq!(registry.cancel_all(), 0);
        assert!(registry.is_empty());
    }
}
