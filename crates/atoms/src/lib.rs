#![deny(unused)]
//! Atom Registry and Atom Invoker for Atomflow.
//!
//! An atom is a pre-registered HTTP service (merge, concat, group, chart,
//! etc.) the ReAct engine calls as an action. This crate owns the pool of
//! registered atoms and the HTTP boundary for calling them; it does not
//! decide what to call or interpret the result — that's the engine's job.

pub mod invoker;
pub mod registry;

pub use invoker::HttpAtomInvoker;
pub use registry::StaticAtomRegistry;
