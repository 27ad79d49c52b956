//! Insight Generator types (spec §4.9), content-addressed cache entries
//! and per-step/terminal narrative payloads.

use serde::{Deserialize, Serialize};

/// Per-atom insight payload, rendered into the fixed-section markdown
/// narrative (Summary / What We Obtained / Ready for Next Step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomInsight {
    pub insight: String,
    pub impact: String,
    pub risk: String,
    pub next_action: String,
}

/// A cached narrative, keyed by `sha256(atom_id || facts_digest)`. TTL
/// differs for LLM-backed ("good") vs. template-fallback entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightCacheEntry {
    pub cache_key: String,
    pub markdown: String,
    pub structured: AtomInsight,
    pub is_fallback: bool,
    pub cached_at: i64,
    pub ttl_secs: u64,
}

impl InsightCacheEntry {
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.cached_at > self.ttl_secs as i64
    }
}
