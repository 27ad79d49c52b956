//! Shared application state for the Axum server: the one `ReActEngine`
//! instance, the session store, and the collaborative sync hub all
//! handlers are mounted against.

use std::sync::Arc;

use atomflow_core::traits::{Clock, SessionStore};
use atomflow_engine::ReActEngine;
use atomflow_sync::SyncHub;

pub struct AppState {
    pub engine: Arc<ReActEngine>,
    pub sessions: Arc<dyn SessionStore>,
    pub sync_hub: Arc<SyncHub>,
    pub clock: Arc<dyn Clock>,
}
