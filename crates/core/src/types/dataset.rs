//! Dataset metadata cache types (spec §4.1 "Dataset Metadata Cache"),
//! shaped after the original's `laboratory_retriever.py` column summaries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-column profile used to ground prompt construction in real schema
/// facts instead of letting the LLM hallucinate column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub dtype: String,
    pub sample_values: Vec<Value>,
    pub null_count: u64,
}

/// Cached metadata for one dataset file, refreshed on etag/last-modified
/// change (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub path: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub cached_at: i64,
}

impl DatasetMetadata {
    /// Whether the cached entry is still fresh against a freshly-fetched
    /// etag/last-modified pair.
    pub fn is_stale(&self, etag: Option<&str>, last_modified: Option<&str>) -> bool {
        let etag_changed = match (&self.etag, etag) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };
        let lm_changed = match (&self.last_modified, last_modified) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };
        etag_changed || lm_changed
    }
}

/// A materialized file produced by an atom, prior to being registered in
/// the session's alias registry by the Auto-Save Layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileArtifact {
    pub path: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub created_at: i64,
}
