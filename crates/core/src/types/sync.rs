//! Wire types for the Collaborative Sync Hub (spec §4.11). The hub's
//! behavior (rooms, broadcast, debounced persistence) lives in the `sync`
//! crate; these are the shared data shapes it and its clients speak.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a connected collaborator within a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClientInfo {
    pub client_id: String,
    pub display_name: Option<String>,
}

/// A single card in the collaborative canvas, keyed by `card_id` for
/// dedup (spec §4.11 "card dedup-by-id, last-wins").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPatch {
    pub card_id: String,
    pub data: Value,
    pub updated_by: String,
    pub updated_at: i64,
}

/// Persisted room state: an ordered, deduplicated card list per mode.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomState {
    /// Insertion-ordered; a later patch for an existing `card_id` replaces
    /// its entry in place rather than moving it to the end.
    pub cards: Vec<CardPatch>,
}

impl RoomState {
    /// Applies a patch, replacing any existing card with the same id while
    /// preserving original insertion order.
    pub fn apply(&mut self, patch: CardPatch) {
        if let Some(existing) = self.cards.iter_mut().find(|c| c.card_id == patch.card_id) {
            *existing = patch;
        } else {
            self.cards.push(patch);
        }
    }
}

/// A message sent by a collaborator over `/laboratory/sync/{client}/{app}/{project}`
/// (spec §4.11, §6.2). Clients must send `Connect` before any state message;
/// `mode` defaults to `"laboratory"` when a client omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncClientMessage {
    Connect {
        user: ClientInfo,
        #[serde(default = "default_mode")]
        mode: String,
    },
    StateUpdate {
        mode: String,
        payload: Value,
    },
    CardUpdate {
        mode: String,
        card_id: String,
        payload: Value,
    },
    FullSync {
        mode: String,
        payload: Value,
    },
    CardFocus {
        mode: String,
        card_id: String,
        user: String,
    },
    CardBlur {
        mode: String,
        card_id: String,
    },
    Heartbeat {
        timestamp: i64,
    },
}

fn default_mode() -> String {
    "laboratory".to_string()
}

/// A message broadcast by the hub to room members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncServerMessage {
    StateUpdate {
        mode: String,
        payload: Value,
        from: String,
    },
    CardUpdate {
        mode: String,
        patch: CardPatch,
        from: String,
    },
    FullSync {
        mode: String,
        payload: Value,
        from: String,
    },
    CardFocus {
        mode: String,
        card_id: String,
        user: String,
    },
    CardBlur {
        mode: String,
        card_id: String,
    },
    UserList {
        mode: String,
        users: Vec<ClientInfo>,
    },
    Heartbeat {
        timestamp: i64,
    },
    /// Sent back to the originating socket after a `state_update` broadcast
    /// (supplemented from `websocket.py::handle_state_update`, not in the
    /// distilled spec's §4.11 message list).
    Ack {
        timestamp: i64,
    },
    Error {
        message: String,
    },
}

/// Snapshot of a room's live membership, by mode.
#[derive(Debug, Clone, Default)]
pub struct RoomMembership {
    pub by_mode: HashMap<String, Vec<ClientInfo>>,
}
