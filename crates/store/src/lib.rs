#![deny(unused)]
//! Store layer for Atomflow: Dataset Metadata Cache, Blob Store, Document
//! Store, Insight Cache, and the Session State Store.

pub mod blob_store;
pub mod dataset_cache;
pub mod document_store;
pub mod insight_cache;
pub mod session_store;

pub use blob_store::{HttpBlobStore, InMemoryBlobStore};
pub use dataset_cache::DatasetMetadataCache;
pub use document_store::{HttpDocumentStore, InMemoryDocumentStore};
pub use insight_cache::InsightCache;
pub use session_store::{DurableSessionStore, InMemorySessionStore};
