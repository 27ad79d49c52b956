//! Session Store: in-memory session state, optionally durable via a
//! [`DocumentStore`] for paused sessions (spec "Session State Store" —
//! kept as a seam, default concrete implementation is in-memory only).

use async_trait::async_trait;
use dashmap::DashMap;

use atomflow_core::traits::{DocumentStore, SessionStore};
use atomflow_core::types::Session;
use atomflow_core::Result;

const SESSIONS_COLLECTION: &str = "sessions";

/// Process-local session state. Read/write only under the owning
/// session's Step Guard — this store does not itself serialize access.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|entry| entry.clone()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

/// Wraps an in-memory store with a [`DocumentStore`] backing: reads check
/// memory first, falling back to the document store; writes go to both.
/// Used to survive a process restart while a session sits `paused`.
pub struct DurableSessionStore<D: DocumentStore> {
    memory: InMemorySessionStore,
    documents: D,
}

impl<D: DocumentStore> DurableSessionStore<D> {
    pub fn new(documents: D) -> Self {
        Self {
            memory: InMemorySessionStore::new(),
            documents,
        }
    }
}

#[async_trait]
impl<D: DocumentStore> SessionStore for DurableSessionStore<D> {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        if let Some(session) = self.memory.load(session_id).await? {
            return Ok(Some(session));
        }
        match self.documents.get(SESSIONS_COLLECTION, session_id).await? {
            Some(value) => {
                let session: Session = serde_json::from_value(value)?;
                self.memory.save(&session).await?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.memory.save(session).await?;
        let value = serde_json::to_value(session)?;
        self.documents
            .put(SESSIONS_COLLECTION, &session.session_id, value)
            .await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.memory.delete(session_id).await
    }
}
