//! DocumentStore implementations: HTTP adapter to the external document
//! service, and an in-memory store used by tests and single-node runs.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use atomflow_core::traits::DocumentStore;
use atomflow_core::{Error, Result};

/// Talks to an external document service over HTTP, storing one document
/// per `{endpoint}/{collection}/{key}`.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDocumentStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, collection: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), collection, key)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let resp = self
            .client
            .put(self.url(collection, key))
            .json(&document)
            .send()
            .await
            .map_err(|e| Error::storage(format!("document put failed for {collection}/{key}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::storage(format!(
                "document put for {collection}/{key} returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let resp = self
            .client
            .get(self.url(collection, key))
            .send()
            .await
            .map_err(|e| Error::storage(format!("document get failed for {collection}/{key}: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::storage(format!(
                "document get for {collection}/{key} returned HTTP {}",
                resp.status()
            )));
        }
        let value = resp
            .json()
            .await
            .map_err(|e| Error::storage(format!("malformed document for {collection}/{key}: {e}")))?;
        Ok(Some(value))
    }
}

/// In-memory document store keyed by `(collection, key)`.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<(String, String), Value>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        self.documents
            .insert((collection.to_string(), key.to_string()), document);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .get(&(collection.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips() {
        let store = InMemoryDocumentStore::new();
        store
            .put("sessions", "s1", serde_json::json!({"goal": "chart sales"}))
            .await
            .unwrap();
        let doc = store.get("sessions", "s1").await.unwrap().unwrap();
        assert_eq!(doc["goal"], "chart sales");
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let store = InMemoryDocumentStore::new();
        assert!(store.get("sessions", "nope").await.unwrap().is_none());
    }
}
