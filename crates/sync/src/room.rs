//! A single collaborative-sync Room: one task owns all mutable state for a
//! project key and serializes access to it by receiving commands over a
//! channel, the same "owning task mutates exclusively" discipline the
//! engine uses for session state (spec §4.11, §5 "Sync hub").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use atomflow_core::traits::{Clock, DocumentStore};
use atomflow_core::types::{CardPatch, ClientInfo, RoomState, SyncClientMessage, SyncServerMessage};
use serde_json::Value;
use tokio::sync::mpsc;

const ROOM_STATE_COLLECTION: &str = "room_state";

/// Either an opaque last-known snapshot (`state_update`/`full_sync`) or a
/// structured, dedup'd card list (`card_update`) for one mode.
enum ModeSnapshot {
    Raw(Value),
    Cards(RoomState),
}

impl ModeSnapshot {
    fn into_value(self) -> Value {
        match self {
            ModeSnapshot::Raw(v) => v,
            ModeSnapshot::Cards(rs) => serde_json::to_value(rs).unwrap_or(Value::Null),
        }
    }
}

struct Connection {
    info: ClientInfo,
    mode: String,
    tx: mpsc::UnboundedSender<SyncServerMessage>,
}

/// Commands a room task accepts. `FlushSave` is internal, looped back by the
/// debounce timer; callers only ever send `Join`/`Leave`/`Message`.
pub enum RoomCommand {
    Join {
        client_id: String,
        info: ClientInfo,
        mode: String,
        tx: mpsc::UnboundedSender<SyncServerMessage>,
    },
    Leave {
        client_id: String,
    },
    Message {
        client_id: String,
        msg: SyncClientMessage,
    },
    FlushSave {
        mode: String,
        generation: u64,
    },
}

pub struct Room {
    project_key: String,
    debounce: Duration,
    doc_store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    self_tx: mpsc::UnboundedSender<RoomCommand>,
    connections: HashMap<String, Connection>,
    pending: HashMap<String, ModeSnapshot>,
    generation: HashMap<String, u64>,
    card_editors: HashMap<String, String>,
}

impl Room {
    /// Spawns the room's owning task and returns a handle to send it commands.
    pub fn spawn(
        project_key: String,
        debounce: Duration,
        doc_store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> mpsc::UnboundedSender<RoomCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        let room = Room {
            project_key,
            debounce,
            doc_store,
            clock,
            self_tx: tx.clone(),
            connections: HashMap::new(),
            pending: HashMap::new(),
            generation: HashMap::new(),
            card_editors: HashMap::new(),
        };
        tokio::spawn(room.run(rx));
        tx
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                RoomCommand::Join { client_id, info, mode, tx } => {
                    self.connections.insert(client_id, Connection { info, mode: mode.clone(), tx });
                    self.broadcast_user_list(&mode);
                }
                RoomCommand::Leave { client_id } => {
                    if let Some(conn) = self.connections.remove(&client_id) {
                        self.broadcast_user_list(&conn.mode);
                    }
                }
                RoomCommand::Message { client_id, msg } => self.handle_message(&client_id, msg).await,
                RoomCommand::FlushSave { mode, generation } => self.flush_save(&mode, generation).await,
            }
        }
    }

    async fn handle_message(&mut self, client_id: &str, msg: SyncClientMessage) {
        let sender_name = self
            .connections
            .get(client_id)
            .map(|c| c.info.client_id.clone())
            .unwrap_or_else(|| client_id.to_string());

        match msg {
            SyncClientMessage::Connect { .. } => {
                // Reconnect messages on an already-joined socket are ignored;
                // `Join` is issued once by the transport on upgrade.
            }
            SyncClientMessage::StateUpdate { mode, payload } => {
                self.pending.insert(mode.clone(), ModeSnapshot::Raw(payload.clone()));
                self.schedule_debounce(mode.clone());
                self.broadcast_to_mode(
                    &mode,
                    Some(client_id),
                    SyncServerMessage::StateUpdate { mode: mode.clone(), payload, from: sender_name },
                );
                if let Some(conn) = self.connections.get(client_id) {
                    let _ = conn.tx.send(SyncServerMessage::Ack { timestamp: self.clock.now_ms() });
                }
            }
            SyncClientMessage::CardUpdate { mode, card_id, payload } => {
                self.hydrate_if_absent(&mode).await;
                let patch = CardPatch {
                    card_id,
                    data: payload,
                    updated_by: sender_name.clone(),
                    updated_at: self.clock.now_ms(),
                };
                if let Some(ModeSnapshot::Cards(state)) = self.pending.get_mut(&mode) {
                    state.apply(patch.clone());
                }
                self.schedule_debounce(mode.clone());
                self.broadcast_to_mode(
                    &mode,
                    Some(client_id),
                    SyncServerMessage::CardUpdate { mode: mode.clone(), patch, from: sender_name },
                );
            }
            SyncClientMessage::FullSync { mode, payload } => {
                self.pending.insert(mode.clone(), ModeSnapshot::Raw(payload.clone()));
                self.schedule_debounce(mode.clone());
                self.broadcast_to_mode(
                    &mode,
                    Some(client_id),
                    SyncServerMessage::FullSync { mode: mode.clone(), payload, from: sender_name },
                );
            }
            SyncClientMessage::CardFocus { mode, card_id, user } => {
                self.card_editors.insert(card_id.clone(), user.clone());
                self.broadcast_to_mode(
                    &mode,
                    Some(client_id),
                    SyncServerMessage::CardFocus { mode, card_id, user },
                );
            }
            SyncClientMessage::CardBlur { mode, card_id } => {
                self.card_editors.remove(&card_id);
                self.broadcast_to_mode(&mode, Some(client_id), SyncServerMessage::CardBlur { mode: mode.clone(), card_id });
            }
            SyncClientMessage::Heartbeat { timestamp } => {
                if let Some(conn) = self.connections.get(client_id) {
                    let _ = conn.tx.send(SyncServerMessage::Heartbeat { timestamp });
                }
            }
        }
    }

    /// Pulls the durable snapshot for `mode` the first time a card_update
    /// touches it this session, so edits splice onto prior state rather than
    /// starting from an empty board (spec §4.11 "hydrate ... if empty").
    async fn hydrate_if_absent(&mut self, mode: &str) {
        if matches!(self.pending.get(mode), Some(ModeSnapshot::Cards(_))) {
            return;
        }
        let key = self.storage_key(mode);
        let hydrated = match self.doc_store.get(ROOM_STATE_COLLECTION, &key).await {
            Ok(Some(doc)) => serde_json::from_value(doc).unwrap_or_default(),
            _ => RoomState::default(),
        };
        self.pending.insert(mode.to_string(), ModeSnapshot::Cards(hydrated));
    }

    fn schedule_debounce(&mut self, mode: String) {
        let generation = self.generation.entry(mode.clone()).or_insert(0);
        *generation += 1;
        let generation = *generation;
        let tx = self.self_tx.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = tx.send(RoomCommand::FlushSave { mode, generation });
        });
    }

    /// A later update bumps the generation counter, making this flush a
    /// no-op — the equivalent of cancelling the superseded save timer.
    async fn flush_save(&mut self, mode: &str, generation: u64) {
        if self.generation.get(mode).copied() != Some(generation) {
            return;
        }
        let Some(snapshot) = self.pending.remove(mode) else {
            return;
        };
        let key = self.storage_key(mode);
        let value = snapshot.into_value();
        if let Err(err) = self.doc_store.put(ROOM_STATE_COLLECTION, &key, value.clone()).await {
            tracing::warn!(project_key = %self.project_key, mode, %err, "room state save failed, will retry on next update");
            // Leave the snapshot queryable under its prior shape so the next
            // update schedules a fresh save instead of losing the write.
            self.pending.insert(mode.to_string(), ModeSnapshot::Raw(value));
        }
    }

    fn storage_key(&self, mode: &str) -> String {
        format!("{}:{mode}", self.project_key)
    }

    /// Snapshots the connection set before sending (the original's
    /// concurrent-mutation guard, supplemented feature 3) and sweeps any
    /// socket whose channel has gone away — it missed its `Leave` command,
    /// most likely a dropped connection rather than a clean disconnect.
    fn broadcast_to_mode(&mut self, mode: &str, exclude: Option<&str>, message: SyncServerMessage) {
        let targets: Vec<String> = self
            .connections
            .iter()
            .filter(|(id, conn)| conn.mode == mode && exclude != Some(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();

        let mut stale = Vec::new();
        for client_id in targets {
            let Some(conn) = self.connections.get(&client_id) else { continue };
            if conn.tx.send(message.clone()).is_err() {
                stale.push(client_id);
            }
        }
        for client_id in stale {
            self.connections.remove(&client_id);
        }
    }

    fn broadcast_user_list(&mut self, mode: &str) {
        let users: Vec<ClientInfo> = self
            .connections
            .values()
            .filter(|c| c.mode == mode)
            .map(|c| c.info.clone())
            .collect();
        self.broadcast_to_mode(
            mode,
            None,
            SyncServerMessage::UserList { mode: mode.to_string(), users },
        );
    }
}
