#![deny(unused)]
//! Model Gateway for Atomflow: the HTTP adapter to the external LLM
//! endpoint the ReAct engine consults for planning and evaluation.

pub mod client;

pub use client::{HttpLlmClient, HttpLlmClientConfig};
