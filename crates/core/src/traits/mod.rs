//! Core traits for Atomflow.
//!
//! Traits are organized by architectural layer:
//! - `llm`: LLM Client (planning/evaluation/narrative completions)
//! - `atom_invoker`: Atom Registry lookup + Atom Invoker HTTP boundary
//! - `store`: BlobStore / DocumentStore
//! - `session_store`: Session state persistence
//! - `clock`: injected time source
//! - `events`: structured audit-trail emission

pub mod atom_invoker;
pub mod clock;
pub mod events;
pub mod llm;
pub mod session_store;
pub mod store;

pub use atom_invoker::*;
pub use clock::*;
pub use events::*;
pub use llm::*;
pub use session_store::*;
pub use store::*;
