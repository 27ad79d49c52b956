//! Atom Invoker trait: the injected HTTP boundary to registered atoms
//! (spec §4.1 "Atom Registry", §6.4 "Atom HTTP contract").

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AtomDescriptor, AtomRequest, AtomResponse};

/// Looks up registered atoms by id. Registration itself (how atoms get
/// added to the pool) is out of scope; this trait only models lookup.
pub trait AtomRegistry: Send + Sync {
    fn get(&self, atom_id: &str) -> Option<AtomDescriptor>;
    fn list(&self) -> Vec<AtomDescriptor>;
}

/// Calls a registered atom's HTTP endpoint (spec §4.6 "Atom Invoker").
#[async_trait]
pub trait AtomInvoker: Send + Sync {
    async fn invoke(&self, atom: &AtomDescriptor, request: AtomRequest) -> Result<AtomResponse>;
}
