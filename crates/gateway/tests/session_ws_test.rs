//! Drives `/ws/session/{id}` end-to-end over a real TCP socket: a `start`
//! frame should produce the same event sequence the engine's own in-memory
//! `RecordingSink` tests see (spec §8 S3 "forced chart"), framed as JSON
//! over the wire.

use std::sync::Arc;
use std::time::Duration;

use atomflow_atoms::StaticAtomRegistry;
use atomflow_core::config::EngineConfig;
use atomflow_core::mocks::{
    MockAtomInvoker, MockBlobStore, MockClock, MockDocumentStore, MockLlmClient, MockSessionStore,
};
use atomflow_core::traits::{AtomRegistry, BlobStore, Clock, LlmClient, NoOpEventEmitter, SessionStore};
use atomflow_core::types::{AtomDescriptor, AtomResponse, OutputFieldKind};
use atomflow_engine::ReActEngine;
use atomflow_gateway::{build_router, AppState};
use atomflow_store::dataset_cache::DatasetMetadataCache;
use atomflow_store::insight_cache::InsightCache;
use atomflow_sync::SyncHub;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

fn engine_config() -> EngineConfig {
    EngineConfig {
        max_steps: 20,
        max_operations: 12,
        max_stalled: 4,
        max_replays: 7,
        max_retries_per_step: 2,
        llm_timeout_secs: 60,
        plan_bound_secs: 90,
        eval_bound_secs: 120,
        step_guard_backoff_ms: 10,
        debounce_persist_secs: 1,
        planning_temperature: 0.4,
        evaluation_temperature: 0.1,
    }
}

#[tokio::test]
async fn start_message_drives_single_step_workflow_to_completion() {
    let registry = StaticAtomRegistry::new();
    registry.register(AtomDescriptor {
        atom_id: "chart-maker".into(),
        display_name: "Chart Maker".into(),
        description: String::new(),
        endpoint: "http://atoms.local/chart".parse().unwrap(),
        produces_dataset: false,
        prefers_latest_dataset: true,
        output_field: OutputFieldKind::None,
    });
    let atoms: Arc<dyn AtomRegistry> = Arc::new(registry);

    let invoker = MockAtomInvoker::new();
    invoker.set_response(
        "chart-maker",
        AtomResponse { success: true, data: json!({"chart_path": "chart1.png"}), error: None },
    );
    let invoker = Arc::new(invoker);

    let llm = MockLlmClient::new();
    llm.push_json(json!({
        "atom_id": "chart-maker",
        "description": "bar chart",
        "files_used": [],
        "output_alias": null,
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "complete", "reasoning": "chart rendered", "correctness": true, "issues": []}));
    let llm: Arc<dyn LlmClient> = Arc::new(llm);

    let clock: Arc<dyn Clock> = Arc::new(MockClock::new(1_700_000_000_000));
    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let blob_store: Arc<dyn BlobStore> = Arc::new(MockBlobStore::new());
    let metadata_cache = Arc::new(DatasetMetadataCache::new(300, clock.clone()));
    let engine = Arc::new(ReActEngine::new(
        engine_config(),
        llm,
        atoms,
        invoker,
        blob_store,
        metadata_cache,
        clock.clone(),
        Arc::new(NoOpEventEmitter),
        insight_cache,
    ));

    let sessions: Arc<dyn SessionStore> = Arc::new(MockSessionStore::new());
    let doc_store = Arc::new(MockDocumentStore::new());
    let sync_hub = Arc::new(SyncHub::new(1, doc_store, clock.clone()));
    let state = Arc::new(AppState { engine, sessions, sync_hub: sync_hub.clone(), clock });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(state, sync_hub, &["*".to_string()]);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/session/sess-1"))
        .await
        .expect("connect");

    socket
        .send(Message::Text(
            json!({"type": "start", "goal": "render a bar chart", "session_id": "sess-1"}).to_string(),
        ))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    loop {
        let next = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed early")
            .expect("websocket error");
        match next {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                let kind = value["type"].as_str().unwrap().to_string();
                let done = kind == "workflow_completed";
                kinds.push(kind);
                if done {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    assert_eq!(kinds.first().map(String::as_str), Some("connected"));
    assert!(kinds.contains(&"workflow_started".to_string()));
    assert!(kinds.contains(&"react_action".to_string()));
    assert_eq!(kinds.last().map(String::as_str), Some("workflow_completed"));
}
