//! BlobStore implementations: an HTTP-backed adapter to the external blob
//! service, and an in-memory store used by tests.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use atomflow_core::traits::BlobStore;
use atomflow_core::{Error, Result};

/// Talks to an external blob service over HTTP. The service's API shape
/// (bucket layout, auth) is the operator's concern; this adapter only
/// does PUT/GET/HEAD against `{endpoint}/{path}`.
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBlobStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, path: &str, content: Bytes, content_type: Option<&str>) -> Result<()> {
        let mut req = self.client.put(self.url(path)).body(content);
        if let Some(ct) = content_type {
            req = req.header(reqwest::header::CONTENT_TYPE, ct);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| Error::storage(format!("blob upload failed for {path}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::storage(format!(
                "blob upload for {path} returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| Error::storage(format!("blob download failed for {path}: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ArtifactNotFound(path.to_string()));
        }
        if !resp.status().is_success() {
            return Err(Error::storage(format!(
                "blob download for {path} returned HTTP {}",
                resp.status()
            )));
        }
        resp.bytes()
            .await
            .map_err(|e| Error::storage(format!("blob body read failed for {path}: {e}")))
    }

    async fn head(&self, path: &str) -> Result<(Option<String>, Option<String>)> {
        let resp = self
            .client
            .head(self.url(path))
            .send()
            .await
            .map_err(|e| Error::storage(format!("blob head failed for {path}: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ArtifactNotFound(path.to_string()));
        }
        let etag = resp
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = resp
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((etag, last_modified))
    }
}

/// In-memory blob store used by engine/sync test suites.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, (Bytes, Option<String>)>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, path: &str, content: Bytes, content_type: Option<&str>) -> Result<()> {
        self.blobs
            .insert(path.to_string(), (content, content_type.map(str::to_string)));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        self.blobs
            .get(path)
            .map(|entry| entry.value().0.clone())
            .ok_or_else(|| Error::ArtifactNotFound(path.to_string()))
    }

    async fn head(&self, path: &str) -> Result<(Option<String>, Option<String>)> {
        if self.blobs.contains_key(path) {
            Ok((Some(format!("\"{path}\"")), None))
        } else {
            Err(Error::ArtifactNotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips() {
        let store = InMemoryBlobStore::new();
        store
            .put("datasets/a.csv", Bytes::from_static(b"x,y\n1,2\n"), Some("text/csv"))
            .await
            .unwrap();
        assert_eq!(store.get("datasets/a.csv").await.unwrap().as_ref(), b"x,y\n1,2\n");
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(Error::ArtifactNotFound(_))
        ));
    }
}
