//! Blob/document store traits: the injected boundaries to the external
//! file and metadata stores (spec §9 "BlobStore, DocStore").

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

/// Stores and retrieves opaque file bytes (spec §4.5 "Auto-Save Layer").
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, content: Bytes, content_type: Option<&str>) -> Result<()>;
    async fn get(&self, path: &str) -> Result<Bytes>;
    /// Returns `(etag, last_modified)` without fetching the body, used by
    /// the Dataset Metadata Cache's staleness check.
    async fn head(&self, path: &str) -> Result<(Option<String>, Option<String>)>;
}

/// Stores structured documents — session snapshots, room state — keyed by
/// an opaque id (spec §4.11 "debounced persistence").
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()>;
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;
}
