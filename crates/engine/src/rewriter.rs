//! Plan Rewriter (spec §4.5): two deterministic normalizations applied to
//! every accepted plan before execution. Pure; no I/O.

use atomflow_core::types::{Session, StepPlan};

const CHART_MAKER_ATOM: &str = "chart-maker";

/// Alias-resolves `files_used`/`inputs` and rebinds chart-maker's input to
/// the most recent output file.
pub fn rewrite(session: &Session, mut plan: StepPlan) -> StepPlan {
    plan.files_used = plan
        .files_used
        .iter()
        .map(|token| session.resolve_alias(token))
        .collect();
    plan.inputs = resolve_inputs(session, plan.inputs);

    if plan.atom_id == CHART_MAKER_ATOM {
        if let Some(latest) = most_recent_output(session) {
            plan.files_used = vec![latest];
        }
    }

    plan
}

/// Most recent materialized output: prefers the last step's auto-saved
/// path, falling back to the last entry of `available_files`.
fn most_recent_output(session: &Session) -> Option<String> {
    session
        .execution_history
        .iter()
        .rev()
        .find_map(|record| record.plan.output_alias.as_ref().and_then(|alias| session.alias_registry.get(alias)))
        .cloned()
        .or_else(|| session.available_files.last().cloned())
}

fn resolve_inputs(session: &Session, value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(session.resolve_alias(&s)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(|v| resolve_inputs(session, v)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, resolve_inputs(session, v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomflow_core::types::{ProjectContext, SessionMode};
    use serde_json::json;

    fn session() -> Session {
        let mut s = Session::new(
            "s1",
            "goal",
            ProjectContext {
                client: "c".into(),
                app: "a".into(),
                project: "p".into(),
            },
            SessionMode::Laboratory,
            vec!["raw.csv".into(), "files/grouped_1.arrow".into()],
            0,
        );
        s.register_alias("Grouped Data", "files/grouped_1.arrow");
        s
    }

    #[test]
    fn alias_resolution_is_case_and_whitespace_insensitive() {
        let plan = StepPlan {
            step_number: 3,
            atom_id: "chart-maker".into(),
            human_description: "chart it".into(),
            files_used: vec!["  grouped data  ".into()],
            inputs: json!({}),
            output_alias: None,
            prompt: None,
        };
        let rewritten = rewrite(&session(), plan);
        assert_eq!(rewritten.files_used, vec!["files/grouped_1.arrow".to_string()]);
    }

    #[test]
    fn chart_maker_rebinds_to_most_recent_available_file_without_history() {
        let plan = StepPlan {
            step_number: 1,
            atom_id: "chart-maker".into(),
            human_description: "chart it".into(),
            files_used: vec!["raw.csv".into()],
            inputs: json!({}),
            output_alias: None,
            prompt: None,
        };
        let rewritten = rewrite(&session(), plan);
        assert_eq!(rewritten.files_used, vec!["files/grouped_1.arrow".to_string()]);
    }
}
