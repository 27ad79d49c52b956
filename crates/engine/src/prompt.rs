//! Prompt Builder (spec §4.1 step 3, §4.8): deterministic, pure string
//! construction. No LLM call happens here.

use atomflow_core::types::{DatasetMetadata, Session, StepPlan};

/// Hard truncation bound for the evaluation prompt's result snapshot
/// (spec §4.8).
pub const EVAL_RESULT_TRUNCATE_CHARS: usize = 1500;

/// Builds the planning prompt from the current session snapshot: goal,
/// execution history, and available files annotated with column metadata
/// where known.
pub fn planning_prompt(
    session: &Session,
    file_metadata: &[DatasetMetadata],
    loop_risk: bool,
) -> String {
    let mut out = String::new();
    out.push_str("You are planning the next step of a data analysis workflow.\n\n");
    out.push_str(&format!("Goal: {}\n\n", session.goal));

    out.push_str("Available files:\n");
    for file in &session.available_files {
        match file_metadata.iter().find(|m| &m.path == file) {
            Some(meta) => {
                out.push_str(&format!("- {} (rows={}, columns=[", file, meta.row_count));
                let cols: Vec<String> = meta
                    .columns
                    .iter()
                    .map(|c| format!("{}:{}", c.column_name, c.dtype))
                    .collect();
                out.push_str(&cols.join(", "));
                out.push_str("])\n");
            }
            None => out.push_str(&format!("- {}\n", file)),
        }
    }
    out.push('\n');

    if session.execution_history.is_empty() {
        out.push_str("No steps executed yet.\n\n");
    } else {
        out.push_str("Execution history:\n");
        for record in &session.execution_history {
            out.push_str(&format!(
                "- step {}: {} ({}) -> {}\n",
                record.plan.step_number,
                record.plan.atom_id,
                record.plan.human_description,
                if record.success { "success" } else { "failed" }
            ));
        }
        out.push('\n');
    }

    if loop_risk {
        out.push_str(
            "Note: the most recently used atom operated on the same file set under \
             consideration now. Propose a different atom or different files, or \
             conclude the goal is achieved.\n\n",
        );
    }

    out.push_str(
        "Respond with JSON only: {\"atom_id\", \"description\", \"files_used\", \
         \"inputs\", \"output_alias\", \"goal_achieved\"}.\n",
    );
    out
}

/// Tells the planner its prior choice was rejected and it must pick a
/// genuinely different approach (spec §4.9 "change_approach").
pub fn change_approach_note(previous: &StepPlan) -> String {
    format!(
        "Your previous proposal (atom \"{}\" over {:?}) was rejected. Propose a \
         different atom or a different set of files.\n",
        previous.atom_id, previous.files_used
    )
}

/// Builds the evaluation prompt: goal + last step plan + truncated result
/// snapshot + last 3 history summaries (spec §4.8).
pub fn evaluation_prompt(session: &Session, plan: &StepPlan, result: &serde_json::Value) -> String {
    let mut out = String::new();
    out.push_str("Evaluate whether this step's result serves the stated goal.\n\n");
    out.push_str(&format!("Goal: {}\n", session.goal));
    out.push_str(&format!(
        "Step {}: {} ({})\n",
        plan.step_number, plan.atom_id, plan.human_description
    ));

    let rendered = serde_json::to_string(result).unwrap_or_default();
    let truncated = truncate_chars(&rendered, EVAL_RESULT_TRUNCATE_CHARS);
    out.push_str(&format!("Result: {}\n\n", truncated));

    let recent: Vec<&atomflow_core::types::StepRecord> =
        session.execution_history.iter().rev().take(3).collect();
    if !recent.is_empty() {
        out.push_str("Recent history:\n");
        for record in recent.into_iter().rev() {
            out.push_str(&format!(
                "- step {}: {} -> {}\n",
                record.plan.step_number,
                record.plan.atom_id,
                if record.success { "success" } else { "failed" }
            ));
        }
        out.push('\n');
    }

    out.push_str(
        "Respond with JSON only: {\"decision\", \"reasoning\", \"quality_score\", \
         \"correctness\", \"issues\", \"corrected_prompt\"}. decision must be one \
         of continue, retry_with_correction, change_approach, complete.\n",
    );
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max).collect();
        truncated.push('…');
        truncated
    }
}
