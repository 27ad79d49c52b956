//! Atom registry and wire-contract types (spec §4.1 "Atom Registry", §4.3
//! "Dependency Validator", §6.4 "Atom HTTP contract").

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Which field of an atom's JSON response carries the materialized output
/// path, so the Dependency Validator knows where to look (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFieldKind {
    /// `merge_json.result_file`
    MergeJsonResultFile,
    /// `concat_json.result_file`
    ConcatJsonResultFile,
    /// `output_file`
    OutputFile,
    /// `saved_path`
    SavedPath,
    /// The atom produces no materialized dataset (e.g. a chart atom).
    None,
}

impl OutputFieldKind {
    /// Extracts the materialized path from an atom's raw JSON response, if
    /// this atom kind produces one.
    pub fn extract<'a>(&self, response: &'a Value) -> Option<&'a str> {
        match self {
            Self::MergeJsonResultFile => response
                .get("merge_json")
                .and_then(|v| v.get("result_file"))
                .and_then(Value::as_str),
            Self::ConcatJsonResultFile => response
                .get("concat_json")
                .and_then(|v| v.get("result_file"))
                .and_then(Value::as_str),
            Self::OutputFile => response.get("output_file").and_then(Value::as_str),
            Self::SavedPath => response.get("saved_path").and_then(Value::as_str),
            Self::None => None,
        }
    }
}

/// A registered atom: an HTTP service the engine can invoke as a ReAct
/// action (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomDescriptor {
    pub atom_id: String,
    pub display_name: String,
    pub description: String,
    pub endpoint: Url,
    /// Whether this atom's output should be auto-saved as a new dataset
    /// file (spec §4.5 "Auto-Save Layer").
    pub produces_dataset: bool,
    /// Whether a downstream chart-maker step should be rebound to this
    /// atom's output when no explicit file was named (spec §4.5 "Plan
    /// Rewriter" chart-maker rebind rule).
    pub prefers_latest_dataset: bool,
    pub output_field: OutputFieldKind,
}

/// Request body sent to an atom's HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomRequest {
    pub session_id: String,
    pub step_number: u32,
    pub files: Vec<String>,
    pub inputs: Value,
    pub prompt: Option<String>,
}

/// Raw JSON response from an atom's HTTP endpoint, before the Dependency
/// Validator / Auto-Save Layer interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomResponse {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}
