//! Atom registry: holds the pool of pre-registered atoms an engine session
//! can call as a ReAct action (spec §4.1 "Atom Registry"). Registration
//! itself (how the pool is populated — config file, admin API) is the
//! operator's concern; this registry only models lookup over an already
//! materialized set of descriptors.

use dashmap::DashMap;
use serde::Deserialize;

use atomflow_core::traits::AtomRegistry as AtomRegistryTrait;
use atomflow_core::types::{AtomDescriptor, OutputFieldKind};
use atomflow_core::{Error, Result};

/// Static, DashMap-backed registry loaded once at startup.
pub struct StaticAtomRegistry {
    atoms: DashMap<String, AtomDescriptor>,
}

impl StaticAtomRegistry {
    pub fn new() -> Self {
        Self {
            atoms: DashMap::new(),
        }
    }

    pub fn register(&self, atom: AtomDescriptor) {
        tracing::info!(atom_id = %atom.atom_id, endpoint = %atom.endpoint, "registering atom");
        self.atoms.insert(atom.atom_id.clone(), atom);
    }

    /// Parses a TOML document listing atoms, in the shape an operator
    /// would hand-write for a deployment's atom pool.
    pub fn from_toml(document: &str) -> Result<Self> {
        let parsed: AtomPoolFile = toml::from_str(document)
            .map_err(|e| Error::internal(format!("invalid atom pool config: {e}")))?;

        let registry = Self::new();
        for entry in parsed.atom {
            let descriptor = entry.into_descriptor()?;
            registry.register(descriptor);
        }
        Ok(registry)
    }
}

impl Default for StaticAtomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomRegistryTrait for StaticAtomRegistry {
    fn get(&self, atom_id: &str) -> Option<AtomDescriptor> {
        self.atoms.get(atom_id).map(|entry| entry.clone())
    }

    fn list(&self) -> Vec<AtomDescriptor> {
        self.atoms.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct AtomPoolFile {
    #[serde(default)]
    atom: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    atom_id: String,
    display_name: String,
    #[serde(default)]
    description: String,
    endpoint: String,
    #[serde(default)]
    produces_dataset: bool,
    #[serde(default)]
    prefers_latest_dataset: bool,
    #[serde(default = "default_output_field")]
    output_field: String,
}

fn default_output_field() -> String {
    "none".to_string()
}

impl AtomEntry {
    fn into_descriptor(self) -> Result<AtomDescriptor> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| Error::internal(format!("invalid atom endpoint for {}: {e}", self.atom_id)))?;

        let output_field = match self.output_field.as_str() {
            "merge_json_result_file" => OutputFieldKind::MergeJsonResultFile,
            "concat_json_result_file" => OutputFieldKind::ConcatJsonResultFile,
            "output_file" => OutputFieldKind::OutputFile,
            "saved_path" => OutputFieldKind::SavedPath,
            "none" => OutputFieldKind::None,
            other => {
                return Err(Error::internal(format!(
                    "unknown output_field '{other}' for atom {}",
                    self.atom_id
                )))
            }
        };

        Ok(AtomDescriptor {
            atom_id: self.atom_id,
            display_name: self.display_name,
            description: self.description,
            endpoint,
            produces_dataset: self.produces_dataset,
            prefers_latest_dataset: self.prefers_latest_dataset,
            output_field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_atoms_from_toml() {
        let doc = r#"
            [[atom]]
            atom_id = "merge-datasets"
            display_name = "Merge Datasets"
            endpoint = "http://atoms.local/merge"
            produces_dataset = true
            output_field = "merge_json_result_file"

            [[atom]]
            atom_id = "chart-maker"
            display_name = "Chart Maker"
            endpoint = "http://atoms.local/chart"
            prefers_latest_dataset = true
        "#;

        let registry = StaticAtomRegistry::from_toml(doc).unwrap();
        assert_eq!(registry.list().len(), 2);

        let merge = registry.get("merge-datasets").unwrap();
        assert!(merge.produces_dataset);
        assert_eq!(merge.output_field, OutputFieldKind::MergeJsonResultFile);

        let chart = registry.get("chart-maker").unwrap();
        assert!(chart.prefers_latest_dataset);
        assert_eq!(chart.output_field, OutputFieldKind::None);
    }

    #[test]
    fn unknown_atom_returns_none() {
        let registry = StaticAtomRegistry::new();
        assert!(registry.get("nonexistent").is_none());
    }
}
