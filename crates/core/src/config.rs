use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub model_gateway: ModelGatewayConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub json_logs: bool,
    pub otel_endpoint: Option<String>,
}

/// Resource caps and timing bounds for the ReAct engine (spec §5).
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub max_steps: u32,
    pub max_operations: u32,
    pub max_stalled: u32,
    pub max_replays: u32,
    pub max_retries_per_step: u32,
    pub llm_timeout_secs: u64,
    pub plan_bound_secs: u64,
    pub eval_bound_secs: u64,
    pub step_guard_backoff_ms: u64,
    pub debounce_persist_secs: u64,
    pub planning_temperature: f32,
    pub evaluation_temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelGatewayConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<Secret<String>>,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub blob_endpoint: String,
    pub document_endpoint: String,
    pub metadata_cache_ttl_secs: u64,
    pub insight_cache_good_ttl_secs: u64,
    pub insight_cache_fallback_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    pub debounce_persist_secs: u64,
    pub default_mode: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ATOMFLOW_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Maps APP__SERVER__PORT=3000 to server.port
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 3000,
                allowed_origins: vec!["*".into()],
                json_logs: false,
                otel_endpoint: None,
            },
            engine: EngineConfig {
                max_steps: 20,
                max_operations: 12,
                max_stalled: 4,
                max_replays: 7,
                max_retries_per_step: 2,
                llm_timeout_secs: 60,
                plan_bound_secs: 90,
                eval_bound_secs: 120,
                step_guard_backoff_ms: 500,
                debounce_persist_secs: 1,
                planning_temperature: 0.4,
                evaluation_temperature: 0.1,
            },
            model_gateway: ModelGatewayConfig {
                endpoint: "http://localhost:8100/v1/chat/completions".into(),
                model: "default".into(),
                api_key: None,
                max_tokens: 2048,
            },
            store: StoreConfig {
                blob_endpoint: "http://localhost:8200".into(),
                document_endpoint: "http://localhost:8300".into(),
                metadata_cache_ttl_secs: 300,
                insight_cache_good_ttl_secs: 6 * 3600,
                insight_cache_fallback_ttl_secs: 600,
            },
            sync: SyncConfig {
                debounce_persist_secs: 1,
                default_mode: "laboratory".into(),
            },
        }
    }
}
