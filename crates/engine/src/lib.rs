#![deny(unused)]
//! ReAct orchestration engine: plans, validates, executes and evaluates
//! each step of a workflow against a pool of atoms, streaming progress
//! over a per-session sink (spec §4 "ReAct Orchestration Engine").

pub mod autosave;
pub mod dependency;
pub mod engine;
pub mod evaluator;
pub mod insight;
pub mod prompt;
pub mod replay;
pub mod rewriter;
pub mod sink;
pub mod step_guard;

pub use autosave::{auto_save, AutoSaveOutcome};
pub use dependency::validate;
pub use engine::ReActEngine;
pub use evaluator::evaluate;
pub use replay::{replay, ReplayOutcome};
pub use rewriter::rewrite;
pub use sink::{Disconnect, SessionSink};
pub use step_guard::StepGuardTable;
