//! Session state store trait (spec §3 "Session State Store").

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Session;

/// In-memory-first session state, optionally backed by a [`crate::traits::DocumentStore`]
/// for durability across restarts (spec §4.1 "Session State Store").
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn delete(&self, session_id: &str) -> Result<()>;
}
