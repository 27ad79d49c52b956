//! Session WebSocket Bus (`/ws/session/{session_id}`, spec §4.10, §6.1): the
//! transport binding `SessionSink` to a real socket and turning `{type:
//! "cancel"}` / `{type:"resume"}` client frames into the engine's
//! cooperative-cancellation flag and `resume()` call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomflow_core::types::{
    ProjectContext, Session, SessionEvent, SessionEventEnvelope, SessionMode, TerminalStatus,
};
use atomflow_engine::sink::{Disconnect, SessionSink};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};

use crate::state::AppState;

/// The only message an idle connection accepts; everything else is
/// rejected until `start` has been processed (mirrors the sync hub's
/// "connect required before state messages" rule).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Start {
        goal: String,
        session_id: String,
        #[serde(default)]
        chat_id: Option<String>,
        #[serde(default)]
        files: Option<Vec<String>>,
        #[serde(default)]
        history_summary: Option<String>,
        #[serde(default)]
        file_focus: Option<String>,
        #[serde(default)]
        intent_route: Option<String>,
        /// Not present on the wire per spec §6.1's `start` shape; accepted
        /// here so a project-scoped client can opt into a specific room
        /// instead of the `default` fallback (open question, see DESIGN.md).
        #[serde(default)]
        client: Option<String>,
        #[serde(default)]
        app: Option<String>,
        #[serde(default)]
        project: Option<String>,
        #[serde(default)]
        mode: Option<String>,
    },
    Cancel {},
    Resume {},
}

/// Wraps the outbound half of a split socket so `SessionSink::send`, which
/// takes `&self`, can still serialize writes (spec §4.10 "single-producer
/// per session, sends serialized").
struct AxumWsSink {
    out: Mutex<SplitSink<WebSocket, Message>>,
    clock: Arc<dyn atomflow_core::traits::Clock>,
}

#[async_trait::async_trait]
impl SessionSink for AxumWsSink {
    async fn send(&self, event: SessionEvent) -> Result<(), Disconnect> {
        let envelope = SessionEventEnvelope { event, timestamp: Some(self.clock.now_ms()) };
        let json = serde_json::to_string(&envelope).map_err(|_| Disconnect)?;
        let mut out = self.out.lock().await;
        out.send(Message::Text(json)).await.map_err(|_| Disconnect)
    }
}

pub async fn session_ws_handler(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session_socket(session_id, state, socket))
}

async fn handle_session_socket(path_session_id: String, state: Arc<AppState>, socket: WebSocket) {
    let (sink_half, mut stream) = socket.split();
    let sink = Arc::new(AxumWsSink { out: Mutex::new(sink_half), clock: state.clock.clone() });

    sink.send(SessionEvent::Connected { session_id: path_session_id.clone() }).await.ok();

    let start = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Start { goal, session_id, chat_id, files, history_summary, file_focus, intent_route, client, app, project, mode }) => {
                    if chat_id.is_some() || history_summary.is_some() || file_focus.is_some() || intent_route.is_some() {
                        tracing::debug!(
                            session_id = %session_id,
                            "accepted start fields with no engine-side model (chat_id/history_summary/file_focus/intent_route)"
                        );
                    }
                    break Some((goal, session_id, files.unwrap_or_default(), client, app, project, mode));
                }
                Ok(_) => {
                    sink.send(SessionEvent::Error { message: "expected start as the first message".into() }).await.ok();
                }
                Err(err) => {
                    sink.send(SessionEvent::Error { message: format!("invalid message: {err}") }).await.ok();
                }
            },
            Some(Ok(Message::Close(_))) | None => break None,
            Some(Err(_)) => break None,
            _ => continue,
        }
    };

    let Some((goal, session_id, files, client, app, project, mode)) = start else {
        return;
    };

    let project_context = ProjectContext {
        client: client.unwrap_or_else(|| "default".to_string()),
        app: app.unwrap_or_else(|| "default".to_string()),
        project: project.unwrap_or_else(|| "default".to_string()),
    };
    let session_mode = mode
        .as_deref()
        .map(SessionMode::parse_or_default)
        .unwrap_or_default();

    let mut session = match state.sessions.load(&session_id).await {
        Ok(Some(existing)) => existing,
        _ => Session::new(session_id.clone(), goal, project_context, session_mode, files, state.clock.now_ms()),
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let (resume_tx, mut resume_rx) = mpsc::unbounded_channel::<()>();

    let reader_cancelled = cancelled.clone();
    let reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Cancel {}) => reader_cancelled.store(true, Ordering::SeqCst),
                    Ok(ClientMessage::Resume {}) => {
                        let _ = resume_tx.send(());
                    }
                    Ok(ClientMessage::Start { .. }) => {}
                    Err(_) => {}
                },
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    let mut status = match state.engine.run(&mut session, sink.as_ref(), &cancelled).await {
        Ok(status) => status,
        Err(err) => {
            tracing::warn!(session_id = %session_id, %err, "workflow run failed");
            sink.send(SessionEvent::Error { message: err.to_string() }).await.ok();
            reader.abort();
            return;
        }
    };

    while status == TerminalStatus::Paused {
        state.sessions.save(&session).await.ok();
        if resume_rx.recv().await.is_none() {
            // Socket closed before an explicit resume; leave the session
            // paused in the store for a later reconnect to pick up.
            reader.abort();
            return;
        }
        status = match state.engine.resume(&mut session, sink.as_ref(), &cancelled).await {
            Ok(status) => status,
            Err(err) => {
                sink.send(SessionEvent::Error { message: err.to_string() }).await.ok();
                reader.abort();
                return;
            }
        };
    }

    reader.abort();

    match status {
        TerminalStatus::Completed | TerminalStatus::Stopped => {
            state.sessions.delete(&session.session_id).await.ok();
        }
        TerminalStatus::Aborted => {
            state.sessions.save(&session).await.ok();
        }
        TerminalStatus::Paused => unreachable!("loop only exits once status leaves Paused"),
    }

    let close = CloseFrame {
        code: if matches!(status, TerminalStatus::Aborted) { 1011 } else { 1000 },
        reason: std::borrow::Cow::Borrowed(status_reason(status)),
    };
    let mut out = sink.out.lock().await;
    let _ = out.send(Message::Close(Some(close))).await;
}

fn status_reason(status: TerminalStatus) -> &'static str {
    match status {
        TerminalStatus::Completed => "workflow completed",
        TerminalStatus::Stopped => "workflow stopped",
        TerminalStatus::Aborted => "workflow aborted",
        TerminalStatus::Paused => "paused",
    }
}
