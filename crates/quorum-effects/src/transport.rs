//! Transport handler for hosts without a signer network
//!
//! Records each dispatched signing request as a structured log event. Hosts
//! that front a real signer network replace this with their own
//! `SignerTransport`.

use async_trait::async_trait;
use quorum_core::{SignerTransport, SigningTask, TransportError};
use tracing::info;

/// Logs signing requests instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

#[async_trait]
impl SignerTransport for TracingTransport {
    async fn dispatch(&self, task: SigningTask) -> Result<(), TransportError> {
        if task.eligible_signers.is_empty() {
            return Err(TransportError::Unreachable(format!(
                "{} has no eligible signers",
                task.session_id
            )));
        }
        info!(
            session_id = %task.session_id,
            message_hash = %task.message_hash,
            signers = task.eligible_signers.len(),
            expires_at_ms = task.expires_at_ms,
            "Signing request dispatched"
        );
        Ok(())
    }
}
