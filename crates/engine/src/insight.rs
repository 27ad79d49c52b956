//! Insight Generator (spec §4.12): per-step narrative (fixed markdown
//! sections) and terminal narrative, both via the LLM Client. Atom-level
//! structured insights are cached content-addressed in `atomflow_store`.

use std::sync::Arc;

use atomflow_core::traits::{ChatMessage, LlmClient};
use atomflow_core::types::{AtomInsight, Session, StepRecord};
use atomflow_store::insight_cache::{cache_key, InsightCache};

/// Fixed section headings the original's `workflow_insight_agent.py`
/// renders, reused verbatim so downstream clients can parse the markdown.
const SECTION_HEADINGS: [&str; 3] = ["## Summary", "## What We Obtained", "## Ready for Next Step"];

const STRUCTURED_INSIGHT_MAX_ATTEMPTS: usize = 2;

#[derive(serde::Deserialize, Default)]
struct RawAtomInsight {
    #[serde(default)]
    insight: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    risk: String,
    #[serde(default)]
    next_action: String,
}

impl From<RawAtomInsight> for AtomInsight {
    fn from(raw: RawAtomInsight) -> Self {
        Self {
            insight: raw.insight,
            impact: raw.impact,
            risk: raw.risk,
            next_action: raw.next_action,
        }
    }
}

/// Generates the per-step markdown narrative and the atom-level structured
/// insight (`insight/impact/risk/next_action`, spec §4.12) in parallel, both
/// cached under the same content hash. Returns `(markdown, structured,
/// is_fallback)`.
pub async fn per_step_insight(
    llm: &Arc<dyn LlmClient>,
    cache: &InsightCache,
    atom_id: &str,
    facts_digest: &str,
    record: &StepRecord,
) -> (String, AtomInsight, bool) {
    let key = cache_key(atom_id, facts_digest);
    if let Some(entry) = cache.get(&key) {
        return (entry.markdown, entry.structured, entry.is_fallback);
    }

    let observation = record
        .observation
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_default();

    let narrative_prompt = format!(
        "Write a short markdown narrative for this completed workflow step using \
         exactly these headings: {}.\n\nStep: {} ({})\nSuccess: {}\nResult: {}",
        SECTION_HEADINGS.join(", "),
        record.plan.step_number,
        record.plan.atom_id,
        record.success,
        observation,
    );
    let narrative_messages = vec![
        ChatMessage::system("You write terse, factual workflow narratives in markdown."),
        ChatMessage::user(narrative_prompt),
    ];

    let structured_prompt = format!(
        "Extract a structured business insight from this completed workflow step. \
         Respond with JSON only: {{\"insight\", \"impact\", \"risk\", \"next_action\"}}, \
         each a short factual sentence.\n\nStep: {} ({})\nSuccess: {}\nResult: {}",
        record.plan.step_number, record.plan.atom_id, record.success, observation,
    );
    let structured_messages = vec![
        ChatMessage::system("You extract structured business insight from a workflow step. Respond with JSON only."),
        ChatMessage::user(structured_prompt),
    ];

    let (narrative_result, structured_result) = tokio::join!(
        llm.complete_text(&narrative_messages, 0.3),
        llm.complete_json(&structured_messages, 0.3, STRUCTURED_INSIGHT_MAX_ATTEMPTS),
    );

    let (markdown, narrative_failed) = match narrative_result {
        Ok(markdown) => (markdown, false),
        Err(_) => (fallback_markdown(record), true),
    };

    let (structured, structured_failed) = match structured_result {
        Ok(value) => match serde_json::from_value::<RawAtomInsight>(value) {
            Ok(raw) => (AtomInsight::from(raw), false),
            Err(_) => (fallback_structured_insight(record), true),
        },
        Err(_) => (fallback_structured_insight(record), true),
    };

    let is_fallback = narrative_failed || structured_failed;
    cache.put(key, markdown.clone(), structured.clone(), is_fallback);
    (markdown, structured, is_fallback)
}

/// After the loop exits, assembles all step records into a terminal
/// summary. Returns `None` if the LLM call fails — the engine emits
/// `workflow_insight_failed` in that case.
pub async fn terminal_insight(llm: &Arc<dyn LlmClient>, session: &Session) -> Option<String> {
    let mut steps = String::new();
    for record in &session.execution_history {
        steps.push_str(&format!(
            "- step {}: {} ({})\n",
            record.plan.step_number,
            record.plan.atom_id,
            if record.success { "success" } else { "failed" }
        ));
    }

    let prompt = format!(
        "Summarize this completed workflow for the goal \"{}\" using exactly these \
         headings: {}.\n\nSteps:\n{}",
        session.goal,
        SECTION_HEADINGS.join(", "),
        steps
    );
    let messages = vec![
        ChatMessage::system("You write terse, factual workflow narratives in markdown."),
        ChatMessage::user(prompt),
    ];

    llm.complete_text(&messages, 0.3).await.ok()
}

fn fallback_structured_insight(record: &StepRecord) -> AtomInsight {
    AtomInsight {
        insight: format!(
            "Step {} ({}) {}.",
            record.plan.step_number,
            record.plan.atom_id,
            if record.success { "completed" } else { "failed" }
        ),
        impact: "Unable to determine downstream impact automatically.".into(),
        risk: if record.success {
            "None observed.".into()
        } else {
            "Step failed; downstream results may be incomplete.".into()
        },
        next_action: if record.success {
            "Continue with the next planned step.".into()
        } else {
            "Resolve the failure before proceeding.".into()
        },
    }
}

fn fallback_markdown(record: &StepRecord) -> String {
    format!(
        "## Summary\nStep {} ({}) {}.\n\n## What We Obtained\nSee step result for details.\n\n## Ready for Next Step\n{}",
        record.plan.step_number,
        record.plan.atom_id,
        if record.success { "completed" } else { "failed" },
        if record.success { "Yes." } else { "Not until the failure is resolved." }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomflow_core::mocks::{MockClock, MockLlmClient};
    use serde_json::json;

    fn record() -> StepRecord {
        StepRecord {
            plan: atomflow_core::types::StepPlan {
                step_number: 1,
                atom_id: "merge".into(),
                human_description: "merge files".into(),
                files_used: vec![],
                inputs: json!({}),
                output_alias: None,
                prompt: None,
            },
            observation: Some(json!({"row_count": 10})),
            success: true,
            error: None,
            evaluation: None,
            started_at: 0,
            finished_at: 1,
        }
    }

    #[tokio::test]
    async fn llm_failure_produces_fallback_narrative() {
        let mock = Arc::new(MockLlmClient::new());
        let llm: Arc<dyn LlmClient> = mock;
        let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
        let cache = InsightCache::new(clock);

        let (markdown, structured, is_fallback) =
            per_step_insight(&llm, &cache, "merge", "digest", &record()).await;
        assert!(is_fallback);
        assert!(markdown.contains("## Summary"));
        assert!(!structured.insight.is_empty());
    }

    #[tokio::test]
    async fn successful_calls_produce_non_fallback_insight_and_are_cached() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_text("## Summary\nmerged 10 rows.\n\n## What We Obtained\nmerged.arrow\n\n## Ready for Next Step\nYes.");
        mock.push_json(json!({
            "insight": "merge completed with 10 rows",
            "impact": "dataset ready for downstream grouping",
            "risk": "none observed",
            "next_action": "group by region"
        }));
        let llm: Arc<dyn LlmClient> = mock;
        let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
        let cache = InsightCache::new(clock);

        let (markdown, structured, is_fallback) =
            per_step_insight(&llm, &cache, "merge", "digest", &record()).await;
        assert!(!is_fallback);
        assert!(markdown.contains("merged 10 rows"));
        assert_eq!(structured.next_action, "group by region");

        // Second call with the same atom/digest must hit the cache rather
        // than drain the mock's (now-empty) response queues.
        let (cached_markdown, cached_structured, cached_is_fallback) =
            per_step_insight(&llm, &cache, "merge", "digest", &record()).await;
        assert_eq!(cached_markdown, markdown);
        assert_eq!(cached_structured.next_action, structured.next_action);
        assert!(!cached_is_fallback);
    }
}
