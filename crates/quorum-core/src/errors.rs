//! Unified error system for threshold signing
//!
//! One error type for every caller-facing operation. Variants carry enough
//! context to be logged and surfaced to the host verbatim; `kind()` folds them
//! onto the coarse taxonomy hosts use to choose a response code.

use crate::{BondAmount, NodeId, SessionId};
use serde::{Deserialize, Serialize};

/// Coarse failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad bond, duplicate registration, malformed input or configuration
    Validation,
    /// Submission from a signer that is not currently Active
    Authorization,
    /// Unknown session or signer
    NotFound,
    /// Admission control rejection
    Capacity,
    /// Operation attempted on a terminal or already-advanced session
    State,
    /// Session timed out
    Expiry,
    /// Delegated cryptographic combination failed
    Combine,
    /// Infrastructure failure (clock, channels)
    Internal,
}

/// Unified error type for registry and session operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum QuorumError {
    /// Bond below the configured minimum
    #[error("Insufficient bond: {bond} < minimum {minimum}")]
    InsufficientBond {
        /// Offered bond
        bond: BondAmount,
        /// Configured minimum
        minimum: BondAmount,
    },

    /// Node already Active or Waitlisted
    #[error("Already a signer: {node_id}")]
    AlreadySigner {
        /// Duplicate node
        node_id: NodeId,
    },

    /// Node is neither Active nor Waitlisted
    #[error("Signer not found: {node_id}")]
    SignerNotFound {
        /// Missing node
        node_id: NodeId,
    },

    /// Submitter is not an Active signer
    #[error("Unauthorized signer: {node_id}")]
    UnauthorizedSigner {
        /// Rejected node
        node_id: NodeId,
    },

    /// Unknown session id
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// Missing session
        session_id: SessionId,
    },

    /// Admission control rejected a new request
    #[error("Too many pending signing sessions (limit {limit})")]
    TooManyPending {
        /// Configured cap
        limit: usize,
    },

    /// Registry has no Active signers
    #[error("No active signers")]
    NoActiveSigners,

    /// Session already reached a terminal status
    #[error("Session {session_id} is not accepting input (status {status})")]
    SessionNotAcceptingInput {
        /// Session
        session_id: SessionId,
        /// Current terminal status name
        status: String,
    },

    /// Session deadline passed
    #[error("Session {session_id} expired at {expired_at_ms}")]
    SessionExpired {
        /// Session
        session_id: SessionId,
        /// Deadline in Unix milliseconds
        expired_at_ms: u64,
    },

    /// Scheme combiner rejected the shares
    #[error("Combine error: {message}")]
    Combine {
        /// Combiner failure description
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// What was invalid
        message: String,
    },

    /// Clock failure
    #[error("Time error: {message}")]
    Time {
        /// Clock failure description
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Failure description
        message: String,
    },
}

impl QuorumError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a combine error
    pub fn combine(message: impl Into<String>) -> Self {
        Self::Combine {
            message: message.into(),
        }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientBond { .. } | Self::AlreadySigner { .. } | Self::Invalid { .. } => {
                ErrorKind::Validation
            }
            Self::UnauthorizedSigner { .. } => ErrorKind::Authorization,
            Self::SignerNotFound { .. } | Self::SessionNotFound { .. } => ErrorKind::NotFound,
            Self::TooManyPending { .. } | Self::NoActiveSigners => ErrorKind::Capacity,
            Self::SessionNotAcceptingInput { .. } => ErrorKind::State,
            Self::SessionExpired { .. } => ErrorKind::Expiry,
            Self::Combine { .. } => ErrorKind::Combine,
            Self::Time { .. } | Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl From<crate::time::TimeError> for QuorumError {
    fn from(err: crate::time::TimeError) -> Self {
        Self::Time {
            message: err.to_string(),
        }
    }
}

impl From<crate::effects::CombineError> for QuorumError {
    fn from(err: crate::effects::CombineError) -> Self {
        Self::combine(err.to_string())
    }
}

impl From<std::io::Error> for QuorumError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// Standard Result type for signing operations
pub type Result<T> = std::result::Result<T, QuorumError>;
