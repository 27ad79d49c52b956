//! LLM Client trait: the injected interface for the ReAct engine's planning
//! and evaluation calls (spec §9 "Model these as injected interfaces").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// LLM client interface used by the Prompt Builder / Result Evaluator.
///
/// Implementations are responsible for decoding the raw completion into
/// JSON and retrying on malformed output; callers only see the final
/// decoded value or a [`crate::error::Error::LlmDecode`] once attempts are
/// exhausted.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs a chat completion and parses the response as JSON, retrying
    /// decode failures internally up to `max_attempts` (3 for planning, 2
    /// for evaluation, per spec §4.2 "Plan" / §4.6 "Evaluate").
    async fn complete_json(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_attempts: usize,
    ) -> Result<Value>;

    /// Runs a chat completion and returns raw text, used for free-form
    /// narrative generation (spec §4.9 "Insight Generator").
    async fn complete_text(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

/// Chat message for LLM interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (system, user, assistant).
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Token usage from an LLM call, surfaced for logging/metrics only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}
