//! In-memory mock collaborators used by the engine/atoms/store/sync test
//! suites. Never compiled into the production binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::traits::{AtomInvoker, BlobStore, Clock, DocumentStore, LlmClient, SessionStore};
use crate::traits::llm::ChatMessage;
use crate::types::{AtomDescriptor, AtomRequest, AtomResponse, Session};

/// Replays a fixed queue of JSON/text responses, in order. Panics (test
/// failure, not production behavior) if the queue is exhausted.
#[derive(Default)]
pub struct MockLlmClient {
    json_responses: Mutex<Vec<Result<Value>>>,
    text_responses: Mutex<Vec<Result<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, response: Value) {
        self.json_responses.lock().unwrap().push(Ok(response));
    }

    pub fn push_json_err(&self, err: Error) {
        self.json_responses.lock().unwrap().push(Err(err));
    }

    pub fn push_text(&self, response: impl Into<String>) {
        self.text_responses.lock().unwrap().push(Ok(response.into()));
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_json(
        &self,
        _messages: &[ChatMessage],
        _temperature: f32,
        _max_attempts: usize,
    ) -> Result<Value> {
        let mut queue = self.json_responses.lock().unwrap();
        if queue.is_empty() {
            return Err(Error::internal("MockLlmClient: json response queue exhausted"));
        }
        queue.remove(0)
    }

    async fn complete_text(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        let mut queue = self.text_responses.lock().unwrap();
        if queue.is_empty() {
            return Err(Error::internal("MockLlmClient: text response queue exhausted"));
        }
        queue.remove(0)
    }
}

/// Invokes atoms by consulting a fixed response map keyed by `atom_id`,
/// recording every call for assertions.
#[derive(Default)]
pub struct MockAtomInvoker {
    responses: Mutex<HashMap<String, Result<AtomResponse>>>,
    pub calls: Mutex<Vec<AtomRequest>>,
}

impl MockAtomInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&self, atom_id: impl Into<String>, response: AtomResponse) {
        self.responses.lock().unwrap().insert(atom_id.into(), Ok(response));
    }

    pub fn set_error(&self, atom_id: impl Into<String>, err: Error) {
        self.responses.lock().unwrap().insert(atom_id.into(), Err(err));
    }
}

#[async_trait]
impl AtomInvoker for MockAtomInvoker {
    async fn invoke(&self, atom: &AtomDescriptor, request: AtomRequest) -> Result<AtomResponse> {
        self.calls.lock().unwrap().push(request);
        let responses = self.responses.lock().unwrap();
        match responses.get(&atom.atom_id) {
            Some(Ok(resp)) => Ok(resp.clone()),
            Some(Err(_)) => Err(Error::atom_execution(format!(
                "mock error for atom {}",
                atom.atom_id
            ))),
            None => Err(Error::atom_not_found(atom.atom_id.clone())),
        }
    }
}

/// In-memory blob store keyed by path.
#[derive(Default)]
pub struct MockBlobStore {
    blobs: Mutex<HashMap<String, (Bytes, Option<String>)>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, path: &str, content: Bytes, content_type: Option<&str>) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), (content, content_type.map(str::to_string)));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| Error::ArtifactNotFound(path.to_string()))
    }

    async fn head(&self, path: &str) -> Result<(Option<String>, Option<String>)> {
        if self.blobs.lock().unwrap().contains_key(path) {
            Ok((Some(format!("\"{path}\"")), None))
        } else {
            Err(Error::ArtifactNotFound(path.to_string()))
        }
    }
}

/// In-memory document store keyed by `(collection, key)`.
#[derive(Default)]
pub struct MockDocumentStore {
    documents: Mutex<HashMap<(String, String), Value>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), key.to_string()), document);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MockSessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }
}

/// Deterministic clock, advanced manually by tests.
pub struct MockClock {
    now_ms: AtomicI64,
}

impl MockClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_llm_client_replays_queue_in_order() {
        let client = MockLlmClient::new();
        client.push_json(serde_json::json!({"a": 1}));
        client.push_json(serde_json::json!({"a": 2}));

        let first = client.complete_json(&[], 0.0, 3).await.unwrap();
        let second = client.complete_json(&[], 0.0, 3).await.unwrap();

        assert_eq!(first, serde_json::json!({"a": 1}));
        assert_eq!(second, serde_json::json!({"a": 2}));
    }

    #[tokio::test]
    async fn mock_llm_client_errors_when_exhausted() {
        let client = MockLlmClient::new();
        assert!(client.complete_json(&[], 0.0, 3).await.is_err());
    }

    #[test]
    fn mock_clock_advances() {
        let clock = MockClock::new(1000);
        assert_eq!(clock.now_ms(), 1000);
        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1500);
    }

    #[tokio::test]
    async fn mock_blob_store_round_trips() {
        let store = MockBlobStore::new();
        store
            .put("datasets/a.csv", Bytes::from_static(b"x,y\n1,2\n"), Some("text/csv"))
            .await
            .unwrap();
        let bytes = store.get("datasets/a.csv").await.unwrap();
        assert_eq!(bytes.as_ref(), b"x,y\n1,2\n");
    }
}
