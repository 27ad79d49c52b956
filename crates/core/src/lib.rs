#![deny(unused)]
//! Core types, traits, and error definitions for Atomflow.
//!
//! This crate provides the foundational building blocks shared across all
//! layers of the workflow orchestration system: the domain types (session,
//! plan, atom, guard, dataset, insight, sync), the injected-collaborator
//! traits (LlmClient, AtomInvoker, BlobStore, DocumentStore, SessionStore,
//! Clock), structured errors, the internal event envelope, and layered
//! configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use events::*;
pub use traits::*;
pub use types::*;
