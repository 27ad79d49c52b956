//! Auto-Save Layer (spec §4.6): converts an atom's returned payload into a
//! materialized file, registers its alias, and appends it to
//! `available_files`.

use atomflow_core::traits::{AtomInvoker, Clock};
use atomflow_core::types::{AtomDescriptor, Session};
use atomflow_core::Result;

const LOADER_ATOM_ID: &str = "data-upload-validate";

/// Outcome of an auto-save attempt. A failed save still lets the step be
/// considered "executed" (spec §4.6 last paragraph) — downstream
/// Dependency Validation will see the missing output and trigger Replay.
pub struct AutoSaveOutcome {
    pub path: Option<String>,
    pub alias: Option<String>,
}

/// Synthesizes `<output_alias>_<UTC timestamp>.arrow`, sanitized to
/// `[A-Za-z0-9_-]`.
pub fn synthesize_filename(output_alias: &str, now_ms: i64) -> String {
    let sanitized: String = output_alias
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}.arrow", sanitized, now_ms)
}

/// Applies the Auto-Save Layer to an atom's raw response, mutating
/// `session.available_files`/`alias_registry` in place on success.
pub async fn auto_save<I: AtomInvoker + ?Sized, C: Clock>(
    invoker: &I,
    clock: &C,
    atom: &AtomDescriptor,
    session: &mut Session,
    output_alias: Option<&str>,
    response: &serde_json::Value,
) -> Result<AutoSaveOutcome> {
    if !atom.produces_dataset {
        return Ok(AutoSaveOutcome { path: None, alias: None });
    }

    if atom.atom_id == LOADER_ATOM_ID {
        let path = atom.output_field.extract(response).map(str::to_string);
        if let Some(path) = &path {
            register_output(session, path, output_alias);
        }
        return Ok(AutoSaveOutcome {
            path,
            alias: output_alias.map(str::to_string),
        });
    }

    let alias = output_alias.unwrap_or(atom.atom_id.as_str());
    let filename = synthesize_filename(alias, clock.now_ms());

    let save_result = invoker
        .invoke(
            atom,
            atomflow_core::types::AtomRequest {
                session_id: session.session_id.clone(),
                step_number: session.react_state.current_step_number,
                files: vec![filename.clone()],
                inputs: response.clone(),
                prompt: None,
            },
        )
        .await;

    match save_result {
        Ok(saved) if saved.success => {
            let path = atom
                .output_field
                .extract(&saved.data)
                .map(str::to_string)
                .unwrap_or(filename);
            register_output(session, &path, output_alias);
            Ok(AutoSaveOutcome {
                path: Some(path),
                alias: output_alias.map(str::to_string),
            })
        }
        _ => Ok(AutoSaveOutcome { path: None, alias: None }),
    }
}

fn register_output(session: &mut Session, path: &str, alias: Option<&str>) {
    if !session.available_files.iter().any(|f| f == path) {
        session.available_files.push(path.to_string());
    }
    if let Some(alias) = alias {
        session.register_alias(alias, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_sanitized_and_stamped() {
        let name = synthesize_filename("Region Summary!", 1_700_000_000_000);
        assert_eq!(name, "Region_Summary__1700000000000.arrow");
    }
}
