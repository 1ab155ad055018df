//! Capabilities consumed by the signing core
//!
//! The core never inspects signature contents and never talks to remote
//! signers or callback targets directly. These traits are the seams:
//!
//! - `Combiner`: scheme-specific combination of partial signatures
//! - `SignerTransport`: delivers a `SigningTask` to remote signer processes
//! - `CallbackEffects`: delivers a completed signature to its callback target
//!
//! Transport and callback delivery are driven by dedicated worker loops that
//! consume the task messages defined here.

use crate::{ChainAddress, Hash32, NodeId, SessionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Failure inside a scheme combiner
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CombineError {
    /// Fewer shares than the threshold
    #[error("insufficient shares: have {have}, need {need}")]
    InsufficientShares {
        /// Shares supplied
        have: usize,
        /// Threshold
        need: usize,
    },
    /// Threshold is zero or exceeds the signer count
    #[error("invalid threshold {threshold} for {total_signers} signers")]
    InvalidThreshold {
        /// Requested threshold
        threshold: u32,
        /// Signer count
        total_signers: u32,
    },
    /// A share does not have the scheme's wire format
    #[error("malformed share from {node_id}: {reason}")]
    MalformedShare {
        /// Contributing node
        node_id: NodeId,
        /// What was wrong
        reason: String,
    },
    /// Shares disagree on a value that must be common to all of them
    #[error("inconsistent shares: {reason}")]
    InconsistentShares {
        /// What disagreed
        reason: String,
    },
    /// Scheme-specific failure not covered above
    #[error("{0}")]
    Scheme(String),
}

/// Combines partial signatures into a final signature.
///
/// Implementations are scheme-specific and may be slow; the session manager
/// always calls `combine` without holding its bookkeeping lock.
#[async_trait]
pub trait Combiner: Send + Sync {
    /// Scheme name for logs
    fn scheme_name(&self) -> &'static str;

    /// Produce the final signature from at least `threshold` shares.
    async fn combine(
        &self,
        partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
        threshold: u32,
        total_signers: u32,
    ) -> Result<Vec<u8>, CombineError>;
}

/// Signing request handed to the transport worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningTask {
    /// Session to contribute to
    pub session_id: SessionId,
    /// Digest the signers must sign
    pub message_hash: Hash32,
    /// Signers Active when the request was admitted
    pub eligible_signers: Vec<NodeId>,
    /// Deadline in Unix milliseconds
    pub expires_at_ms: u64,
}

/// Caller-supplied callback attached to a signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// Address notified on completion
    pub target: ChainAddress,
    /// Opaque payload returned to the target
    pub payload: Vec<u8>,
}

/// Completed-signature notification handed to the callback worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackTask {
    /// Completed session
    pub session_id: SessionId,
    /// Callback target
    pub target: ChainAddress,
    /// Callback payload
    pub payload: Vec<u8>,
    /// Final combined signature
    pub signature: Vec<u8>,
}

/// Transport delivery failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum TransportError {
    /// No route to any eligible signer
    #[error("unreachable: {0}")]
    Unreachable(String),
    /// Delivery failed after being attempted
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Callback delivery failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CallbackError {
    /// Target rejected or could not be invoked
    #[error("callback to {target} failed: {reason}")]
    Failed {
        /// Callback target
        target: ChainAddress,
        /// Reason
        reason: String,
    },
}

/// Delivers signing requests to remote signer processes.
///
/// Remote signers eventually answer through
/// `SessionManager::submit_partial_signature`.
#[async_trait]
pub trait SignerTransport: Send + Sync {
    /// Hand one signing request to the signer network
    async fn dispatch(&self, task: SigningTask) -> Result<(), TransportError>;
}

/// Invokes callback targets for completed sessions.
///
/// Delivery is at-most-once and unacknowledged; failures never revert the
/// session's Complete status.
#[async_trait]
pub trait CallbackEffects: Send + Sync {
    /// Invoke the callback target with the final signature
    async fn deliver(&self, task: CallbackTask) -> Result<(), CallbackError>;
}
