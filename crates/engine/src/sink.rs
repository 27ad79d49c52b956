//! WebSocket Session Bus (spec §4.10): single-producer per session, sends
//! serialized. A typed `Disconnect` ends the run cleanly instead of the
//! engine catching errors across layers (spec §9 design note).

use async_trait::async_trait;

use atomflow_core::types::SessionEvent;

/// Raised by a [`SessionSink`] when the underlying socket is closed or
/// errored. The engine matches on this to end the run without treating it
/// as a workflow failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnect;

impl std::fmt::Display for Disconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session socket disconnected")
    }
}

impl std::error::Error for Disconnect {}

/// Abstraction over the session WebSocket. Implementations probe
/// connection state before every send.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn send(&self, event: SessionEvent) -> Result<(), Disconnect>;
}

/// Collects emitted events in memory; used by engine tests and by a
/// disconnected-socket-free dry run.
#[derive(Default)]
pub struct RecordingSink {
    pub events: tokio::sync::Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionSink for RecordingSink {
    async fn send(&self, event: SessionEvent) -> Result<(), Disconnect> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
