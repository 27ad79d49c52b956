#![deny(unused)]
//! Collaborative Sync Hub: per-project rooms that broadcast card/state
//! deltas among clients mode-scoped, with debounced persistence to the
//! document store (spec §4.11, §6.2). Independent of the ReAct session bus
//! in `atomflow_engine` — a project's Room outlives any one workflow run.

pub mod handler;
pub mod hub;
pub mod room;

pub use handler::sync_ws_handler;
pub use hub::SyncHub;
pub use room::{Room, RoomCommand};
