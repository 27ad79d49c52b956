//! HTTP Atom Invoker: calls a registered atom's endpoint and decodes its
//! response (spec §4.6 "Atom Invoker", §6.4 "Atom HTTP contract").

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};

use atomflow_core::traits::AtomInvoker as AtomInvokerTrait;
use atomflow_core::types::{AtomDescriptor, AtomRequest, AtomResponse};
use atomflow_core::{Error, Result};

/// Caps the body we'll buffer from an atom's response, mirroring the
/// bounded-download pattern used for outbound fetches elsewhere in the
/// stack.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

pub struct HttpAtomInvoker {
    client: reqwest::Client,
}

impl HttpAtomInvoker {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpAtomInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AtomInvokerTrait for HttpAtomInvoker {
    async fn invoke(&self, atom: &AtomDescriptor, request: AtomRequest) -> Result<AtomResponse> {
        tracing::debug!(
            atom_id = %atom.atom_id,
            step_number = request.step_number,
            "invoking atom"
        );

        let resp = self
            .client
            .post(atom.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::atom_execution(format!("{}: request failed: {e}", atom.atom_id)))?;

        let status = resp.status();
        let mut stream = resp.bytes_stream();
        let mut buffer = Vec::new();
        let mut total_size = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| Error::atom_execution(format!("{}: body read failed: {e}", atom.atom_id)))?;
            total_size += chunk.len() as u64;
            if total_size > MAX_RESPONSE_BYTES {
                return Err(Error::atom_execution(format!(
                    "{}: response exceeded {MAX_RESPONSE_BYTES} bytes",
                    atom.atom_id
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        let mut hasher = Sha256::new();
        hasher.update(&buffer);
        let body_hash = format!("{:x}", hasher.finalize());
        tracing::debug!(atom_id = %atom.atom_id, %status, body_hash, "atom responded");

        if !status.is_success() {
            return Err(Error::atom_execution(format!(
                "{}: HTTP {status}",
                atom.atom_id
            )));
        }

        let parsed: AtomResponse = serde_json::from_slice(&buffer)
            .map_err(|e| Error::atom_execution(format!("{}: malformed response: {e}", atom.atom_id)))?;

        Ok(parsed)
    }
}
