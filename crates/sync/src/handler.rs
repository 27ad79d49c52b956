//! Axum WebSocket transport for the Collaborative Sync Hub
//! (`/laboratory/sync/{client}/{app}/{project}`, spec §6.2). One socket per
//! collaborator; outbound fan-out and inbound commands race in the same
//! `tokio::select!` shape the session bus uses for its own transport.

use std::sync::Arc;

use atomflow_core::types::{SyncClientMessage, SyncServerMessage};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hub::SyncHub;
use crate::room::RoomCommand;

pub async fn sync_ws_handler(
    Path((client, app, project)): Path<(String, String, String)>,
    State(hub): State<Arc<SyncHub>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let project_key = format!("{client}:{app}:{project}");
    ws.on_upgrade(move |socket| handle_socket(project_key, hub, socket))
}

async fn handle_socket(project_key: String, hub: Arc<SyncHub>, mut socket: WebSocket) {
    let client_id = Uuid::new_v4().to_string();
    let room_tx = hub.room(&project_key);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<SyncServerMessage>();
    let mut connected = false;

    loop {
        tokio::select! {
            outgoing = out_rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        let Ok(json) = serde_json::to_string(&msg) else { continue };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SyncClientMessage>(&text) {
                            Ok(SyncClientMessage::Connect { user, mode }) => {
                                connected = true;
                                let _ = room_tx.send(RoomCommand::Join {
                                    client_id: client_id.clone(),
                                    info: user,
                                    mode,
                                    tx: out_tx.clone(),
                                });
                            }
                            Ok(msg) if connected => {
                                let _ = room_tx.send(RoomCommand::Message { client_id: client_id.clone(), msg });
                            }
                            Ok(_) => {
                                let _ = out_tx.send(SyncServerMessage::Error {
                                    message: "connect required before state messages".into(),
                                });
                            }
                            Err(err) => {
                                tracing::warn!(%err, "invalid sync message");
                                let _ = out_tx.send(SyncServerMessage::Error { message: format!("invalid message: {err}") });
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    let _ = room_tx.send(RoomCommand::Leave { client_id });
}
