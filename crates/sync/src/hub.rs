//! Room registry: hands out (and lazily creates) the command channel for a
//! project's Room, one task per project key (spec §5 "Sync hub: one task
//! per Room serving all sockets").

use std::sync::Arc;
use std::time::Duration;

use atomflow_core::traits::{Clock, DocumentStore};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::room::{Room, RoomCommand};

pub struct SyncHub {
    rooms: DashMap<String, mpsc::UnboundedSender<RoomCommand>>,
    debounce: Duration,
    doc_store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl SyncHub {
    pub fn new(debounce_persist_secs: u64, doc_store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: DashMap::new(),
            debounce: Duration::from_secs(debounce_persist_secs),
            doc_store,
            clock,
        }
    }

    /// Returns the command channel for `project_key`'s room, spawning it on
    /// first access. A dead sender (room task panicked) is respawned.
    pub fn room(&self, project_key: &str) -> mpsc::UnboundedSender<RoomCommand> {
        if let Some(existing) = self.rooms.get(project_key) {
            if !existing.is_closed() {
                return existing.clone();
            }
        }
        let tx = Room::spawn(project_key.to_string(), self.debounce, self.doc_store.clone(), self.clock.clone());
        self.rooms.insert(project_key.to_string(), tx.clone());
        tx
    }
}
