//! Callback handler that records deliveries in the log

use async_trait::async_trait;
use quorum_core::{CallbackEffects, CallbackError, CallbackTask};
use tracing::info;

/// Logs completed-signature callbacks instead of invoking a contract
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCallbackHandler;

#[async_trait]
impl CallbackEffects for TracingCallbackHandler {
    async fn deliver(&self, task: CallbackTask) -> Result<(), CallbackError> {
        info!(
            session_id = %task.session_id,
            target = %task.target,
            payload_len = task.payload.len(),
            signature_len = task.signature.len(),
            "Signature callback delivered"
        );
        Ok(())
    }
}
