//! Client-facing WebSocket wire contract for a session's `/ws/session/{id}`
//! connection (spec §4.10, §6.1). Distinct from [`crate::events::EventEnvelope`],
//! the internal audit trail — this is what actually reaches the browser.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::Decision;

/// One event on the session WebSocket. Internally tagged on `"type"`,
/// matching the original's discriminated-union wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Connected {
        session_id: String,
    },
    WorkflowStarted {
        session_id: String,
        goal: String,
    },
    WorkflowProgress {
        step_number: u32,
        message: String,
    },
    ReactThought {
        step_number: u32,
        thought: String,
    },
    ReactAction {
        step_number: u32,
        atom_id: String,
        human_description: String,
    },
    ReactObservation {
        step_number: u32,
        success: bool,
        summary: String,
    },
    ReactDecision {
        step_number: u32,
        decision: Decision,
        reasoning: String,
    },
    ReactCorrection {
        step_number: u32,
        corrected_prompt: String,
    },
    ReactLoopDetected {
        step_number: u32,
    },
    ReactStalled {
        cycles: u32,
    },
    ReactAbortComplexity {
        operations_executed: u32,
        max_operations: u32,
    },
    AtomPrompt {
        step_number: u32,
        atom_id: String,
        prompt: String,
    },
    AtomRetry {
        step_number: u32,
        atom_id: String,
        attempt: u32,
    },
    AgentExecuted {
        step_number: u32,
        atom_id: String,
        duration_ms: u64,
    },
    StepStarted {
        step_number: u32,
        atom_id: String,
    },
    StepCompleted {
        step_number: u32,
        atom_id: String,
    },
    StepFailed {
        step_number: u32,
        atom_id: String,
        error: String,
    },
    FileCreated {
        step_number: u32,
        path: String,
        alias: Option<String>,
    },
    WorkflowInsight {
        step_number: u32,
        markdown: String,
    },
    InsightFailed {
        step_number: u32,
        error: String,
    },
    WorkflowCompleted {
        session_id: String,
        total_steps: u32,
        summary: String,
    },
    WorkflowStopped {
        session_id: String,
        reason: String,
    },
    ReactGenerationStatus {
        step_number: u32,
        message: String,
    },
    ReactGenerationTimeout {
        step_number: u32,
    },
    ReactGenerationFailed {
        step_number: u32,
        error: String,
    },
    ReactValidationBlocked {
        step_number: u32,
        reason: Value,
    },
    Error {
        message: String,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::WorkflowStarted { .. } => "workflow_started",
            Self::WorkflowProgress { .. } => "workflow_progress",
            Self::ReactThought { .. } => "react_thought",
            Self::ReactAction { .. } => "react_action",
            Self::ReactObservation { .. } => "react_observation",
            Self::ReactDecision { .. } => "react_decision",
            Self::ReactCorrection { .. } => "react_correction",
            Self::ReactLoopDetected { .. } => "react_loop_detected",
            Self::ReactStalled { .. } => "react_stalled",
            Self::ReactAbortComplexity { .. } => "react_abort_complexity",
            Self::AtomPrompt { .. } => "atom_prompt",
            Self::AtomRetry { .. } => "atom_retry",
            Self::AgentExecuted { .. } => "agent_executed",
            Self::StepStarted { .. } => "step_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepFailed { .. } => "step_failed",
            Self::FileCreated { .. } => "file_created",
            Self::WorkflowInsight { .. } => "workflow_insight",
            Self::InsightFailed { .. } => "insight_failed",
            Self::WorkflowCompleted { .. } => "workflow_completed",
            Self::WorkflowStopped { .. } => "workflow_stopped",
            Self::ReactGenerationStatus { .. } => "react_generation_status",
            Self::ReactGenerationTimeout { .. } => "react_generation_timeout",
            Self::ReactGenerationFailed { .. } => "react_generation_failed",
            Self::ReactValidationBlocked { .. } => "react_validation_blocked",
            Self::Error { .. } => "error",
        }
    }
}

/// Envelope wrapping a [`SessionEvent`] with a send timestamp, mirroring
/// the wire shape used by the collaborative sync hub's broadcasts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEventEnvelope {
    #[serde(flatten)]
    pub event: SessionEvent,
    pub timestamp: Option<i64>,
}
