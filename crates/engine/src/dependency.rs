//! Dependency Validator (spec §4.3): a pure function of the last history
//! entry and the proposed next step. Never touches I/O or the Step Guard.

use atomflow_core::types::{
    AtomDescriptor, OutputFieldKind, RejectionReason, Session, StepPlan, StepRecord,
    ValidationOutcome,
};

const ROW_COUNT_FIELD: &str = "row_count";

/// `last_atom` is the [`AtomDescriptor`] for `last.plan.atom_id` — the
/// caller looks it up from the Atom Registry, since a `StepRecord` only
/// stores the id, not the descriptor.
pub fn validate(
    session: &Session,
    last: Option<&StepRecord>,
    last_atom: Option<&AtomDescriptor>,
    proposed: &StepPlan,
) -> ValidationOutcome {
    let (Some(last), Some(last_atom)) = (last, last_atom) else {
        return ValidationOutcome::Ok;
    };

    if !last.success {
        return ValidationOutcome::Rejected(RejectionReason::PreviousStepFailed {
            step_number: last.plan.step_number,
        });
    }

    if last_atom.output_field == OutputFieldKind::None {
        return ValidationOutcome::Ok;
    }

    let expected_output = last
        .observation
        .as_ref()
        .and_then(|obs| last_atom.output_field.extract(obs))
        .map(str::to_string);

    let proposed_tokens: Vec<String> = proposed
        .files_used
        .iter()
        .cloned()
        .chain(json_string_tokens(&proposed.inputs))
        .collect();

    let consumes_prior_output = match &expected_output {
        Some(expected) => proposed_tokens
            .iter()
            .any(|token| session.resolve_alias(token) == *expected || token == expected),
        None => step_likely_depends_on_prior_output(proposed),
    };

    match &expected_output {
        Some(expected) => {
            if consumes_prior_output && !session.available_files.iter().any(|f| f == expected) {
                return ValidationOutcome::Rejected(RejectionReason::MissingMaterializedOutput {
                    atom_id: last.plan.atom_id.clone(),
                    field: field_name(last_atom.output_field),
                });
            }
        }
        None if consumes_prior_output => {
            return ValidationOutcome::Rejected(RejectionReason::MissingMaterializedOutput {
                atom_id: last.plan.atom_id.clone(),
                field: field_name(last_atom.output_field),
            });
        }
        None => {}
    }

    if consumes_prior_output {
        if let Some(row_count) = last
            .observation
            .as_ref()
            .and_then(|obs| obs.get(ROW_COUNT_FIELD))
            .and_then(|v| v.as_i64())
        {
            if row_count <= 0 {
                if let Some(expected) = &expected_output {
                    return ValidationOutcome::Rejected(RejectionReason::EmptyDataset {
                        path: expected.clone(),
                    });
                }
            }
        }
    }

    ValidationOutcome::Ok
}

fn field_name(kind: OutputFieldKind) -> String {
    match kind {
        OutputFieldKind::MergeJsonResultFile => "merge_json.result_file".to_string(),
        OutputFieldKind::ConcatJsonResultFile => "concat_json.result_file".to_string(),
        OutputFieldKind::OutputFile => "output_file".to_string(),
        OutputFieldKind::SavedPath | OutputFieldKind::None => "saved_path".to_string(),
    }
}

/// A step with no explicit files and no `inputs.files` is assumed to
/// implicitly chain off the prior step's output (the common "then group
/// that" planner shorthand).
fn step_likely_depends_on_prior_output(proposed: &StepPlan) -> bool {
    proposed.files_used.is_empty() && proposed.inputs.get("files").is_none()
}

fn json_string_tokens(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(items) => items.iter().flat_map(json_string_tokens).collect(),
        serde_json::Value::Object(map) => map.values().flat_map(json_string_tokens).collect(),
        _ => Vec::new(),
    }
}
