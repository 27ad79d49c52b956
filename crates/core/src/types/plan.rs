//! Step plans, execution records, and evaluation outcomes (spec §3, §4.2,
//! §4.6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single proposed step, as returned by the planning call to the LLM
/// client (spec §4.2 "Thought/Action").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepPlan {
    pub step_number: u32,
    pub atom_id: String,
    pub human_description: String,
    /// Input file tokens (aliases or literal paths) the atom consumes.
    pub files_used: Vec<String>,
    pub inputs: Value,
    /// Name the step's output is registered under in the session's alias
    /// registry, if any.
    pub output_alias: Option<String>,
    /// The rendered prompt sent to the atom, if the atom accepts one.
    pub prompt: Option<String>,
}

/// Outcome of evaluating a step's observation against the goal (spec §4.6
/// "Result Evaluator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub reasoning: String,
    pub quality_score: f32,
    pub correctness: bool,
    pub issues: Vec<String>,
    pub corrected_prompt: Option<String>,
}

/// What the ReAct loop does next after evaluating a step (spec §4.7
/// "Decision Handler").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    RetryWithCorrection,
    ChangeApproach,
    Complete,
}

/// A completed (or failed) step, appended to `Session::execution_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub plan: StepPlan,
    pub observation: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl StepRecord {
    pub fn duration_ms(&self) -> i64 {
        self.finished_at - self.started_at
    }
}
