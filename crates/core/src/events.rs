//! Internal structured audit trail.
//!
//! Distinct from [`crate::types::SessionEvent`], which is the client-facing
//! WebSocket wire contract. `EventEnvelope` is the machine-readable audit
//! record an [`crate::traits::EventEmitter`] fans out to logs/metrics
//! sinks; it is never sent directly to a browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub trace_id: String,
    pub session_id: Option<String>,
    pub project_key: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub severity: EventSeverity,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trace_id: Uuid::new_v4().to_string(),
            session_id: None,
            project_key: None,
            actor: "system".to_string(),
            timestamp: Utc::now(),
            event_type,
            severity: EventSeverity::Info,
            payload,
        }
    }

    pub fn with_trace(mut self, trace_id: &str) -> Self {
        self.trace_id = trace_id.to_string();
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_project(mut self, project_key: &str) -> Self {
        self.project_key = Some(project_key.to_string());
        self
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SessionStarted,
    PlanProposed,
    PlanTimedOut,
    DependencyRejected,
    AtomCallStarted,
    AtomCallFinished,
    AtomRetry,
    FileCreated,
    StepEvaluated,
    ReplayAttempted,
    LoopDetected,
    StallDetected,
    ComplexityAborted,
    SessionPaused,
    SessionResumed,
    SessionCompleted,
    SessionCancelled,
    RoomStateSaved,
    RoomStateSaveFailed,
    SystemError,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Serialize, Deserialize)]
pub struct AtomCallPayload {
    pub atom_id: String,
    pub step_number: u32,
    pub success: Option<bool>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct DependencyRejectionPayload {
    pub step_number: u32,
    pub atom_id: String,
    pub reason: String,
}
