//! The counter backend the gate reads and writes through. `InMemoryRateLimitStore`
//! is the default and what tests run against; a distributed backend (Redis,
//! a shared SQL table) implements the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::error::RateLimitError;

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Current count for a fixed window identified by its start instant,
    /// without mutating it. A stored window with a different start is
    /// treated as not-yet-reset and reported as zero.
    async fn fixed_window_count(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<u64, RateLimitError>;

    /// Increment (resetting first if the window rolled over) and return
    /// the new count.
    async fn fixed_window_increment(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<u64, RateLimitError>;

    /// Count of events within `window` of `now`, pruning expired ones.
    async fn sliding_window_count(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<u64, RateLimitError>;

    /// Record an event at `now` and return the resulting count.
    async fn sliding_window_increment(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<u64, RateLimitError>;
}

struct FixedEntry {
    window_start: DateTime<Utc>,
    count: u64,
}

/// Process-local counter store backed by `dashmap`, sufficient for tests
/// and a single-process deployment.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    fixed: DashMap<String, FixedEntry>,
    sliding: DashMap<String, Vec<DateTime<Utc>>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn fixed_window_count(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<u64, RateLimitError> {
        Ok(self
            .fixed
            .get(key)
            .filter(|e| e.window_start == window_start)
            .map(|e| e.count)
            .unwrap_or(0))
    }

    async fn fixed_window_increment(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<u64, RateLimitError> {
        let mut entry = self.fixed.entry(key.to_string()).or_insert(FixedEntry {
            window_start,
            count: 0,
        });
        if entry.window_start != window_start {
            entry.window_start = window_start;
            entry.count = 0;
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn sliding_window_count(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<u64, RateLimitError> {
        if let Some(mut events) = self.sliding.get_mut(key) {
            events.retain(|t| now.signed_duration_since(*t) < window);
            Ok(events.len() as u64)
        } else {
            Ok(0)
        }
    }

    async fn sliding_window_increment(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<u64, RateLimitError> {
        let mut events = self.sliding.entry(key.to_string()).or_default();
        events.retain(|t| now.signed_duration_since(*t) < window);
        events.push(now);
        Ok(events.len() as u64)
    }
}

/// A store double that always fails, used to exercise the gate's
/// fail-open policy.
#[derive(Default)]
pub struct UnreachableStore;

#[async_trait]
impl RateLimitStore for UnreachableStore {
    async fn fixed_window_count(&self, _: &str, _: DateTime<Utc>) -> Result<u64, RateLimitError> {
        Err(RateLimitError::StoreUnavailable("simulated outage".into()))
    }

    async fn fixed_window_increment(&self, _: &str, _: DateTime<Utc>) -> Result<u64, RateLimitError> {
        Err(RateLimitError::StoreUnavailable("simulated outage".into()))
    }

    async fn sliding_window_count(&self, _: &str, _: DateTime<Utc>, _: Duration) -> Result<u64, RateLimitError> {
        Err(RateLimitError::StoreUnavailable("simulated outage".into()))
    }

    async fn sliding_window_increment(&self, _: &str, _: DateTime<Utc>, _: Duration) -> Result<u64, RateLimitError> {
        Err(RateLimitError::StoreUnavailable("simulated outage".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_window_resets_on_rollover() {
        let store = InMemoryRateLimitStore::new();
        let day1 = Utc::now();
        let day2 = day1 + Duration::days(1);

        assert_eq!(store.fixed_window_increment("k", day1).await.unwrap(), 1);
        assert_eq!(store.fixed_window_increment("k", day1).await.unwrap(), 2);
        assert_eq!(store.fixed_window_increment("k", day2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sliding_window_prunes_expired_events() {
        let store = InMemoryRateLimitStore::new();
        let t0 = Utc::now();
        let window = Duration::seconds(60);

        store.sliding_window_increment("k", t0, window).await.unwrap();
        store.sliding_window_increment("k", t0 + Duration::seconds(10), window).await.unwrap();
        let count = store
            .sliding_window_count("k", t0 + Duration::seconds(90), window)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
