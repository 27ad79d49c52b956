//! HTTP-backed LLM client: the concrete adapter behind [`LlmClient`] for
//! the external planning/evaluation/narrative LLM endpoint (spec §4.1,
//! §4.8, §6.3).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use atomflow_core::traits::llm::{ChatMessage, LlmUsage};
use atomflow_core::traits::LlmClient;
use atomflow_core::{Error, Result};

/// Per-attempt timeout for a single completion call (spec §4.1 `LLM_TIMEOUT = 60s`).
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpLlmClientConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<Secret<String>>,
    pub max_tokens: u32,
}

/// Talks to an OpenAI-chat-completions-shaped HTTP endpoint. The LLM
/// service itself is an external collaborator; this client only owns
/// request construction, bearer auth, and the JSON-decode retry loop.
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: HttpLlmClientConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    async fn send(&self, messages: &[ChatMessage], temperature: f32) -> Result<CompletionEnvelope> {
        let body = CompletionRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut req = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::ModelProvider(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ModelProvider(format!("HTTP {status}: {body}")));
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| Error::ModelProvider(format!("malformed completion envelope: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::ModelProvider("completion returned no choices".into()))?;

        Ok(CompletionEnvelope {
            content,
            usage: parsed.usage.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete_json(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_attempts: usize,
    ) -> Result<Value> {
        let mut last_err = String::new();
        for attempt in 1..=max_attempts.max(1) {
            let envelope = self.send(messages, temperature).await?;
            tracing::debug!(
                attempt,
                prompt_tokens = envelope.usage.prompt_tokens,
                completion_tokens = envelope.usage.completion_tokens,
                "llm completion received"
            );
            match serde_json::from_str::<Value>(envelope.content.trim()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_err = e.to_string();
                    tracing::warn!(attempt, error = %last_err, "llm response was not valid JSON");
                }
            }
        }
        Err(Error::LlmDecode(max_attempts, last_err))
    }

    async fn complete_text(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        Ok(self.send(messages, temperature).await?.content)
    }
}

struct CompletionEnvelope {
    content: String,
    usage: LlmUsage,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HttpLlmClientConfig {
        HttpLlmClientConfig {
            endpoint: "http://127.0.0.1:1/v1/chat/completions".into(),
            model: "default".into(),
            api_key: None,
            max_tokens: 2048,
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_model_provider_error() {
        let client = HttpLlmClient::new(config());
        let result = client
            .complete_json(&[ChatMessage::user("hello")], 0.1, 3)
            .await;
        assert!(matches!(result, Err(Error::ModelProvider(_))));
    }
}
