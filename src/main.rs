#![deny(unused)]
//! Atomflow - workflow orchestration core for an AI-driven data-analysis
//! platform.
//!
//! Wires the injected collaborators (LLM Client, Atom Registry/Invoker,
//! Blob/Document/Session stores, Clock, Event Emitter) into a `ReActEngine`
//! and a `SyncHub`, then serves both over a single Axum router.

use std::sync::Arc;

use atomflow_atoms::{HttpAtomInvoker, StaticAtomRegistry};
use atomflow_core::config::AppConfig;
use atomflow_core::traits::{
    AtomInvoker, AtomRegistry, BlobStore, Clock, EventEmitter, LlmClient, SessionStore, SystemClock,
};
use atomflow_engine::ReActEngine;
use atomflow_gateway::{build_router, AppState};
use atomflow_model_gateway::{HttpLlmClient, HttpLlmClientConfig};
use atomflow_store::dataset_cache::DatasetMetadataCache;
use atomflow_store::insight_cache::InsightCache;
use atomflow_store::{DurableSessionStore, HttpBlobStore, HttpDocumentStore};
use atomflow_sync::SyncHub;

const ATOM_POOL_PATH: &str = "config/atoms.toml";

/// Emits the internal audit trail (spec §9 "Observability") as structured
/// `tracing` events; `tracing-subscriber`'s JSON formatter turns these into
/// log lines, same role the teacher's logs channel plays for its console.
struct TracingEventEmitter;

#[async_trait::async_trait]
impl EventEmitter for TracingEventEmitter {
    async fn emit(&self, event: atomflow_core::events::EventEnvelope) {
        tracing::info!(
            event_type = ?event.event_type,
            severity = ?event.severity,
            session_id = ?event.session_id,
            project_key = ?event.project_key,
            payload = %event.payload,
            "event"
        );
    }
}

fn init_tracing(json_logs: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

fn load_atom_registry() -> Arc<dyn AtomRegistry> {
    match std::fs::read_to_string(ATOM_POOL_PATH) {
        Ok(doc) => match StaticAtomRegistry::from_toml(&doc) {
            Ok(registry) => Arc::new(registry),
            Err(err) => {
                tracing::error!(%err, path = ATOM_POOL_PATH, "invalid atom pool config, starting with an empty registry");
                Arc::new(StaticAtomRegistry::new())
            }
        },
        Err(_) => {
            tracing::warn!(path = ATOM_POOL_PATH, "no atom pool config found, starting with an empty registry");
            Arc::new(StaticAtomRegistry::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load().unwrap_or_else(|err| {
        eprintln!("failed to load config, using defaults: {err}");
        AppConfig::default()
    });

    init_tracing(app_config.server.json_logs);
    tracing::info!("Starting Atomflow v{}", env!("CARGO_PKG_VERSION"));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events: Arc<dyn EventEmitter> = Arc::new(TracingEventEmitter);

    let atoms = load_atom_registry();
    let invoker: Arc<dyn AtomInvoker> = Arc::new(HttpAtomInvoker::new());

    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(HttpLlmClientConfig {
        endpoint: app_config.model_gateway.endpoint.clone(),
        model: app_config.model_gateway.model.clone(),
        api_key: app_config.model_gateway.api_key.clone(),
        max_tokens: app_config.model_gateway.max_tokens,
    }));

    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let blob_store: Arc<dyn BlobStore> = Arc::new(HttpBlobStore::new(app_config.store.blob_endpoint.clone()));
    let metadata_cache = Arc::new(DatasetMetadataCache::new(
        app_config.store.metadata_cache_ttl_secs,
        clock.clone(),
    ));

    let engine = Arc::new(ReActEngine::new(
        app_config.engine.clone(),
        llm,
        atoms,
        invoker,
        blob_store,
        metadata_cache,
        clock.clone(),
        events,
        insight_cache,
    ));

    let documents = HttpDocumentStore::new(app_config.store.document_endpoint.clone());
    let sessions: Arc<dyn SessionStore> = Arc::new(DurableSessionStore::new(documents));

    let sync_documents = Arc::new(HttpDocumentStore::new(app_config.store.document_endpoint.clone()));
    let sync_hub = Arc::new(SyncHub::new(
        app_config.sync.debounce_persist_secs,
        sync_documents,
        clock.clone(),
    ));

    let state = Arc::new(AppState { engine, sessions, sync_hub: sync_hub.clone(), clock });
    let router = build_router(state, sync_hub, &app_config.server.allowed_origins);

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    tracing::info!(%addr, "Atomflow gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
