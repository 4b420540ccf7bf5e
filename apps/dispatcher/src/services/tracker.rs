//! In-memory tracking of submitted requests for duplicate suppression.

use chrono::{Duration, Utc};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::models::{SubmitRequest, TrackedRequest, TrackedStatus};

/// Window inside which a re-submitted infohash counts as a duplicate.
const DUPLICATE_WINDOW_HOURS: i64 = 24;

/// Derive the dedup key for a magnet URI.
///
/// Uses the infohash encoded after `btih:` when present (up to 40 chars),
/// falling back to the SHA-1 of the whole magnet otherwise.
pub fn request_key(magnet: &str) -> String {
    if let Some(idx) = magnet.find("btih:") {
        let tail = &magnet[idx + "btih:".len()..];
        let hash: String = tail.chars().take_while(|c| *c != '&').take(40).collect();
        if !hash.is_empty() {
            return hash;
        }
    }

    let mut hasher = Sha1::new();
    hasher.update(magnet.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Default)]
struct TrackerInner {
    requests: HashMap<String, TrackedRequest>,
    by_category: HashMap<String, Vec<String>>,
}

/// Sole owner of the infohash-to-request mapping.
///
/// All operations take the inner lock exactly once, so concurrent callers
/// always observe a consistent view.
#[derive(Default)]
pub struct RequestTracker {
    inner: Mutex<TrackerInner>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `req` duplicates a request tracked within the last 24
    /// hours, returning the existing entry if so.
    pub async fn is_duplicate(&self, req: &SubmitRequest) -> Option<TrackedRequest> {
        let key = request_key(&req.magnet);
        let inner = self.inner.lock().await;

        let existing = inner.requests.get(&key)?;
        if Utc::now() - existing.timestamp < Duration::hours(DUPLICATE_WINDOW_HOURS) {
            tracing::info!(
                infohash = %key,
                name = %req.name,
                existing = %existing.name,
                "duplicate request detected"
            );
            return Some(existing.clone());
        }
        None
    }

    /// Insert or replace the tracked entry for `req`, returning its key.
    pub async fn add(&self, req: &SubmitRequest, source: Option<&str>) -> String {
        let key = request_key(&req.magnet);
        let tracked = TrackedRequest {
            infohash: key.clone(),
            name: req.name.clone(),
            category: req.category.clone(),
            size_estimate_gb: req.size_estimate_gb,
            magnet: req.magnet.clone(),
            timestamp: Utc::now(),
            source: source.map(str::to_string),
            selected_node: None,
            status: TrackedStatus::Pending,
        };

        let mut inner = self.inner.lock().await;
        inner.requests.insert(key.clone(), tracked);
        let keys = inner.by_category.entry(req.category.clone()).or_default();
        if !keys.contains(&key) {
            keys.push(key.clone());
        }

        tracing::info!(
            infohash = %key,
            name = %req.name,
            category = %req.category,
            source = ?source,
            "tracked new request"
        );
        key
    }

    /// Update the status (and optionally the selected node) of a tracked
    /// request. Unknown keys are a silent no-op.
    pub async fn update_status(&self, key: &str, status: TrackedStatus, selected_node: Option<&str>) {
        let mut inner = self.inner.lock().await;
        if let Some(tracked) = inner.requests.get_mut(key) {
            tracked.status = status;
            if let Some(node) = selected_node {
                tracked.selected_node = Some(node.to_string());
            }
            tracing::info!(infohash = %key, status = ?status, node = ?selected_node, "updated request status");
        }
    }

    /// Evict entries older than `max_age` and return how many were removed.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut inner = self.inner.lock().await;

        let stale: Vec<String> = inner
            .requests
            .iter()
            .filter(|(_, req)| req.timestamp < cutoff)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            if let Some(removed) = inner.requests.remove(key) {
                if let Some(keys) = inner.by_category.get_mut(&removed.category) {
                    keys.retain(|k| k != key);
                }
            }
        }

        if !stale.is_empty() {
            tracing::info!(evicted = stale.len(), "cleaned up old requests");
        }
        stale.len()
    }

    /// All tracked requests, in no particular order.
    pub async fn all(&self) -> Vec<TrackedRequest> {
        self.inner.lock().await.requests.values().cloned().collect()
    }

    /// Tracked requests for one category, in insertion order.
    pub async fn by_category(&self, category: &str) -> Vec<TrackedRequest> {
        let inner = self.inner.lock().await;
        inner
            .by_category
            .get(category)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| inner.requests.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
