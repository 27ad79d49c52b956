//! Insight cache: content-addressed storage for per-atom narrative
//! payloads, keyed by `sha256(atom_id || facts_digest)` (spec §4.12
//! "Insight Generator", §3 "Insight Cache Entry"). Generating the
//! narrative via the LLM Client lives in the engine; this crate only
//! stores and expires the result.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use atomflow_core::traits::Clock;
use atomflow_core::types::{AtomInsight, InsightCacheEntry};

/// TTL for a successfully LLM-generated narrative.
pub const GOOD_TTL_SECS: u64 = 6 * 3600;
/// TTL for a template-fallback narrative (e.g. the LLM call failed).
pub const FALLBACK_TTL_SECS: u64 = 600;

pub fn cache_key(atom_id: &str, facts_digest: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(atom_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(facts_digest.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct InsightCache {
    entries: DashMap<String, InsightCacheEntry>,
    clock: Arc<dyn Clock>,
}

impl InsightCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn get(&self, cache_key: &str) -> Option<InsightCacheEntry> {
        let now = self.clock.now_ms() / 1000;
        let entry = self.entries.get(cache_key)?;
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove(cache_key);
            None
        } else {
            Some(entry.clone())
        }
    }

    pub fn put(&self, cache_key: String, markdown: String, structured: AtomInsight, is_fallback: bool) {
        let now = self.clock.now_ms() / 1000;
        let ttl_secs = if is_fallback { FALLBACK_TTL_SECS } else { GOOD_TTL_SECS };
        self.entries.insert(
            cache_key.clone(),
            InsightCacheEntry {
                cache_key,
                markdown,
                structured,
                is_fallback,
                cached_at: now,
                ttl_secs,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomflow_core::mocks::MockClock;
    use std::sync::Arc;

    fn sample_insight() -> AtomInsight {
        AtomInsight {
            insight: "rows merged cleanly".into(),
            impact: "dataset ready for grouping".into(),
            risk: "none observed".into(),
            next_action: "group by region".into(),
        }
    }

    #[test]
    fn cache_key_is_stable_for_same_inputs() {
        let a = cache_key("merge-datasets", "digest123");
        let b = cache_key("merge-datasets", "digest123");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_across_atoms() {
        let a = cache_key("merge-datasets", "digest123");
        let b = cache_key("chart-maker", "digest123");
        assert_ne!(a, b);
    }

    #[test]
    fn fallback_entries_expire_faster_than_good_entries() {
        let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
        let cache = InsightCache::new(clock);
        cache.put(cache_key("chart-maker", "x"), "## Summary".into(), sample_insight(), true);

        assert!(cache.get(&cache_key("chart-maker", "x")).is_some());
    }

    #[test]
    fn expired_entry_is_evicted_on_get() {
        let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
        let cache = InsightCache::new(clock);
        let key = cache_key("chart-maker", "x");
        cache.put(key.clone(), "## Summary".into(), sample_insight(), true);

        // Fast-forward past the fallback TTL.
        let clock: Arc<dyn atomflow_core::traits::Clock> =
            Arc::new(MockClock::new((FALLBACK_TTL_SECS as i64 + 1) * 1000));
        let cache = InsightCache::new(clock);
        cache.entries.insert(
            key.clone(),
            atomflow_core::types::InsightCacheEntry {
                cache_key: key.clone(),
                markdown: "## Summary".into(),
                structured: sample_insight(),
                is_fallback: true,
                cached_at: 0,
                ttl_secs: FALLBACK_TTL_SECS,
            },
        );

        assert!(cache.get(&key).is_none());
    }
}
