//! Result Evaluator (spec §4.8): an LLM-backed grader with a lower
//! temperature than planning, bounded retries, and a deterministic
//! fallback on hard failure.

use std::sync::Arc;

use atomflow_core::traits::{ChatMessage, LlmClient};
use atomflow_core::types::{Decision, Evaluation, Session, StepPlan};

use crate::prompt::evaluation_prompt;

pub const EVAL_MAX_ATTEMPTS: usize = 2;

pub async fn evaluate(
    llm: &Arc<dyn LlmClient>,
    session: &Session,
    plan: &StepPlan,
    result: &serde_json::Value,
    step_success: bool,
    temperature: f32,
) -> Evaluation {
    let prompt = evaluation_prompt(session, plan, result);
    let messages = vec![
        ChatMessage::system(
            "You are a strict grader for a data-analysis workflow step. Respond with \
             JSON only.",
        ),
        ChatMessage::user(prompt),
    ];

    match llm.complete_json(&messages, temperature, EVAL_MAX_ATTEMPTS).await {
        Ok(value) => parse_evaluation(&value).unwrap_or_else(|| fallback(step_success)),
        Err(_) => fallback(step_success),
    }
}

fn parse_evaluation(value: &serde_json::Value) -> Option<Evaluation> {
    let decision_raw = value.get("decision").and_then(|v| v.as_str()).unwrap_or("continue");
    let decision = match decision_raw {
        "retry_with_correction" => Decision::RetryWithCorrection,
        "change_approach" => Decision::ChangeApproach,
        "complete" => Decision::Complete,
        _ => Decision::Continue,
    };

    Some(Evaluation {
        decision,
        reasoning: value
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        quality_score: value.get("quality_score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
        correctness: value.get("correctness").and_then(|v| v.as_bool()).unwrap_or(true),
        issues: value
            .get("issues")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|i| i.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        corrected_prompt: value
            .get("corrected_prompt")
            .and_then(|v| v.as_str())
            .map(String::from),
    })
}

/// On any hard failure: `continue` if the step succeeded, else
/// `retry_with_correction` (spec §4.8).
fn fallback(step_success: bool) -> Evaluation {
    Evaluation {
        decision: if step_success {
            Decision::Continue
        } else {
            Decision::RetryWithCorrection
        },
        reasoning: "evaluator unavailable; falling back to heuristic decision".to_string(),
        quality_score: if step_success { 0.5 } else { 0.0 },
        correctness: step_success,
        issues: Vec::new(),
        corrected_prompt: None,
    }
}
