//! Step Guard types (spec §4.4 "Step Guard" / "Dependency Validator").

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which phase of a single ReAct cycle currently holds the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStatus {
    Planning,
    Validating,
    Executing,
    Evaluating,
    DecisionReady,
}

/// A held step guard. The `token` must be presented back to release it —
/// a caller holding a stale token cannot release someone else's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepGuard {
    pub token: Uuid,
    pub step_number: u32,
    pub status: GuardStatus,
    pub updated_at: i64,
}

impl StepGuard {
    pub fn acquire(step_number: u32, now: i64) -> Self {
        Self {
            token: Uuid::new_v4(),
            step_number,
            status: GuardStatus::Planning,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, status: GuardStatus, now: i64) {
        self.status = status;
        self.updated_at = now;
    }
}

/// Why the Dependency Validator rejected a proposed step (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    PreviousStepFailed { step_number: u32 },
    MissingMaterializedOutput { atom_id: String, field: String },
    EmptyDataset { path: String },
}

/// Result of validating a proposed step's dependencies before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Ok,
    Rejected(RejectionReason),
}

impl ValidationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}
