//! Session & ReAct state types (spec §3 "Session", "ReActState").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::plan::{StepPlan, StepRecord};

/// Scopes a session to a client/app/project triple, shared with the
/// collaborative sync hub's `project_key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProjectContext {
    pub client: String,
    pub app: String,
    pub project: String,
}

impl ProjectContext {
    /// `client:app:project`, the sync hub's room key (spec §3 "Room").
    pub fn project_key(&self) -> String {
        format!("{}:{}:{}", self.client, self.app, self.project)
    }
}

/// Per-client mode tag, scoping both sync-hub broadcast visibility and
/// persisted state within a project (spec GLOSSARY "Mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Laboratory,
    LaboratoryDashboard,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Laboratory
    }
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Laboratory => "laboratory",
            Self::LaboratoryDashboard => "laboratory-dashboard",
        }
    }

    /// Parses the wire string, falling back to `laboratory` for anything
    /// unrecognized — matches the original's defensive fallback.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "laboratory-dashboard" => Self::LaboratoryDashboard,
            _ => Self::Laboratory,
        }
    }
}

/// Terminal status a session's `execute` run can settle into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Completed,
    Paused,
    Stopped,
    Aborted,
}

/// The ReAct-loop-specific slice of session state (spec §3 "ReActState").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReActState {
    /// Monotonically non-decreasing except when a step is rejected by
    /// dependency validation (spec §9 Open Question 1, §8.1).
    pub current_step_number: u32,
    pub goal_achieved: bool,
    pub paused: bool,
    pub paused_at_step: Option<u32>,
    /// Retry count for the step currently in flight; reset on `continue`.
    pub retry_count: u32,
    /// Consecutive cycles with no history growth (stall guard, §5).
    pub stalled_cycles: u32,
    /// Sequential atoms executed so far (complexity guard, §5).
    pub operations_executed: u32,
}

impl Default for ReActState {
    fn default() -> Self {
        Self {
            current_step_number: 1,
            goal_achieved: false,
            paused: false,
            paused_at_step: None,
            retry_count: 0,
            stalled_cycles: 0,
            operations_executed: 0,
        }
    }
}

/// Per-session state (spec §3 "Session").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub goal: String,
    pub project_context: ProjectContext,
    pub mode: SessionMode,
    /// Ordered; newer files are appended last.
    pub available_files: Vec<String>,
    /// output-alias -> storage path.
    pub alias_registry: HashMap<String, String>,
    pub execution_history: Vec<StepRecord>,
    /// step_number -> cached plan, for replay (spec §4.4).
    pub cached_plans: HashMap<u32, StepPlan>,
    pub react_state: ReActState,
    pub replay_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        goal: impl Into<String>,
        project_context: ProjectContext,
        mode: SessionMode,
        initial_files: Vec<String>,
        now: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            goal: goal.into(),
            project_context,
            mode,
            available_files: initial_files,
            alias_registry: HashMap::new(),
            execution_history: Vec::new(),
            cached_plans: HashMap::new(),
            react_state: ReActState::default(),
            replay_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolves a token (alias or literal path) against the alias registry,
    /// case/whitespace-normalized (spec §4.5 "Alias resolution").
    pub fn resolve_alias(&self, token: &str) -> String {
        let normalized = token.trim().to_lowercase();
        for (alias, path) in &self.alias_registry {
            if alias.trim().to_lowercase() == normalized {
                return path.clone();
            }
        }
        token.to_string()
    }

    pub fn register_alias(&mut self, alias: impl Into<String>, path: impl Into<String>) {
        self.alias_registry.insert(alias.into(), path.into());
    }

    pub fn last_history_entry(&self) -> Option<&StepRecord> {
        self.execution_history.last()
    }
}
