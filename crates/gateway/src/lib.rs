#![deny(unused)]
//! Axum HTTP/WebSocket gateway for Atomflow: wires the ReAct engine's
//! session bus and the collaborative sync hub onto a single server
//! (spec §4.10, §4.11, §6.1, §6.2).

pub mod app;
pub mod session_ws;
pub mod state;

pub use app::build_router;
pub use session_ws::session_ws_handler;
pub use state::AppState;
