//! Pending quality selections
//!
//! When a URL needs a quality choice, the URL and the offered selectors are
//! parked here under a generated request id until the user taps a button.
//! Entries expire after the TTL and the store is capacity-bounded.

use std::time::{Duration, Instant};

use fitcore::config;
use fitcore::download::FormatSelector;
use moka::future::Cache;
use uuid::Uuid;

/// A URL waiting for the user's quality choice
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub url: String,
    pub title: String,
    /// Selectors in keyboard order; the callback index points into this
    pub choices: Vec<FormatSelector>,
}

#[derive(Clone)]
struct Entry {
    request: PendingRequest,
    created: Instant,
}

pub struct RequestContextStore {
    cache: Cache<String, Entry>,
    ttl: Duration,
}

impl RequestContextStore {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { cache, ttl }
    }

    pub fn with_defaults() -> Self {
        Self::new(config::session::request_ttl(), config::session::MAX_PENDING_REQUESTS)
    }

    /// Store a pending request and return its id
    pub async fn insert(&self, request: PendingRequest) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.cache
            .insert(
                id.clone(),
                Entry {
                    request,
                    created: Instant::now(),
                },
            )
            .await;
        id
    }

    /// Remove and return a pending request. A second take of the same id yields `None`.
    pub async fn take(&self, id: &str) -> Option<PendingRequest> {
        self.cache
            .remove(id)
            .await
            .filter(|entry| entry.created.elapsed() < self.ttl)
            .map(|entry| entry.request)
    }
}
