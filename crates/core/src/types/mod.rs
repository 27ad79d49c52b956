//! Core type definitions for Atomflow.
//!
//! This module contains the data structures shared across the engine, the
//! atom registry/invoker, the store, and the gateway/sync layers.

pub mod atom;
pub mod dataset;
pub mod guard;
pub mod insight;
pub mod plan;
pub mod session;
pub mod session_event;
pub mod sync;

pub use atom::*;
pub use dataset::*;
pub use guard::*;
pub use insight::*;
pub use plan::*;
pub use session::*;
pub use session_event::*;
pub use sync::*;
