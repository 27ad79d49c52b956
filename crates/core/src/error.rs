//! Error types for Atomflow.

use thiserror::Error;

/// Result type alias using Atomflow's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Atomflow, grouped by the subsystem that raises it.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Engine errors (ReAct loop, step guard, dependency validation, replay)
    // =========================================================================
    #[error("engine error: {0}")]
    Engine(String),

    #[error("ReAct loop exceeded max steps: {0}")]
    MaxStepsExceeded(usize),

    #[error("session state error: {0}")]
    SessionState(String),

    #[error("step guard busy: session {0} already has an in-flight step")]
    GuardBusy(String),

    #[error("dependency validation rejected: {0}")]
    DependencyRejected(String),

    #[error("replay budget exhausted after {0} attempts")]
    ReplayExhausted(usize),

    // =========================================================================
    // Atom errors (registry + invoker)
    // =========================================================================
    #[error("atom not found: {0}")]
    AtomNotFound(String),

    #[error("atom execution failed: {0}")]
    AtomExecution(String),

    // =========================================================================
    // Store errors (blob store, document store, dataset metadata cache)
    // =========================================================================
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Model gateway errors (LLM client)
    // =========================================================================
    #[error("LLM provider error: {0}")]
    ModelProvider(String),

    #[error("LLM response could not be decoded after {0} attempts: {1}")]
    LlmDecode(usize, String),

    // =========================================================================
    // Sync hub errors (collaborative rooms)
    // =========================================================================
    #[error("sync hub error: {0}")]
    Sync(String),

    // =========================================================================
    // Generic errors
    // =========================================================================
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn session_state(msg: impl Into<String>) -> Self {
        Self::SessionState(msg.into())
    }

    pub fn dependency_rejected(msg: impl Into<String>) -> Self {
        Self::DependencyRejected(msg.into())
    }

    pub fn atom_not_found(name: impl Into<String>) -> Self {
        Self::AtomNotFound(name.into())
    }

    pub fn atom_execution(msg: impl Into<String>) -> Self {
        Self::AtomExecution(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
