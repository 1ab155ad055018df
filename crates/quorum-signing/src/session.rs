//! Signing session state machine
//!
//! ```text
//! Pending ──► InProgress ──► Complete
//!    │            │    └───► Failed
//!    └────────────┴────────► Expired
//! ```
//!
//! Terminal states (Complete, Failed, Expired) are absorbing. Every other
//! transition is refused by `SigningSession::transition`, which is the only
//! place status changes.

use quorum_core::{CallbackRequest, ChainAddress, Hash32, NodeId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of a signing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Created, no partial signature accepted yet
    Pending,
    /// At least one partial signature accepted
    InProgress,
    /// Final signature available
    Complete,
    /// Combination failed
    Failed,
    /// Deadline passed before completion
    Expired,
}

impl SessionStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Complete | SessionStatus::Failed | SessionStatus::Expired
        )
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Complete)
                | (InProgress, Failed)
                | (Pending, Expired)
                | (InProgress, Expired)
        )
    }

    /// Lowercase status name
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
            SessionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signing session owned by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSession {
    /// Deterministic session id
    pub id: SessionId,
    /// Digest the signers are asked to sign
    pub message_hash: Hash32,
    /// Address that requested the signature
    pub requester: ChainAddress,
    /// Creation time
    pub created_at_ms: u64,
    /// Last instant a submission is accepted
    pub expires_at_ms: u64,
    status: SessionStatus,
    /// Last-write-wins per node; one counted share per node
    pub partial_signatures: BTreeMap<NodeId, Vec<u8>>,
    /// Set only on Complete
    pub final_signature: Option<Vec<u8>>,
    /// Combine error, set only on Failed
    pub failure: Option<String>,
    /// Where to deliver the signature on completion
    pub callback: Option<CallbackRequest>,
    /// When the session reached a terminal status
    pub finished_at_ms: Option<u64>,
    /// Set while a combine call runs outside the lock
    pub(crate) combine_in_flight: bool,
}

impl SigningSession {
    /// New Pending session expiring `timeout_ms` after creation
    pub fn new(
        id: SessionId,
        message_hash: Hash32,
        requester: ChainAddress,
        created_at_ms: u64,
        timeout_ms: u64,
        callback: Option<CallbackRequest>,
    ) -> Self {
        Self {
            id,
            message_hash,
            requester,
            created_at_ms,
            expires_at_ms: created_at_ms.saturating_add(timeout_ms),
            status: SessionStatus::Pending,
            partial_signatures: BTreeMap::new(),
            final_signature: None,
            failure: None,
            callback,
            finished_at_ms: None,
            combine_in_flight: false,
        }
    }

    /// Current lifecycle status
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Deadline check used at the moment of use
    pub fn is_past_deadline(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// Apply a transition if it is legal. Returns whether it was applied.
    pub fn transition(&mut self, next: SessionStatus, now_ms: u64) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at_ms = Some(now_ms);
        }
        true
    }

    /// Caller-facing view
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            status: self.status,
            signature: self.final_signature.clone(),
            failure: self.failure.clone(),
            shares_collected: self.partial_signatures.len(),
            expires_at_ms: self.expires_at_ms,
        }
    }
}

/// Result of polling a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session polled
    pub session_id: SessionId,
    /// Status at the time of the poll
    pub status: SessionStatus,
    /// Present only when `status == Complete`
    pub signature: Option<Vec<u8>>,
    /// Present only when `status == Failed`
    pub failure: Option<String>,
    /// Distinct signers whose shares are stored
    pub shares_collected: usize,
    /// Submission deadline
    pub expires_at_ms: u64,
}

/// Session counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Sessions awaiting a first share
    pub pending: usize,
    /// Sessions collecting shares
    pub in_progress: usize,
    /// Sessions with a final signature
    pub complete: usize,
    /// Sessions whose combine failed
    pub failed: usize,
    /// Sessions that timed out
    pub expired: usize,
}

impl SessionStats {
    /// Sessions that still count against admission control
    pub fn live(&self) -> usize {
        self.pending + self.in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SigningSession {
        let msg = Hash32::digest(b"m");
        let requester = ChainAddress::from_bytes([3; 20]);
        SigningSession::new(
            SessionId::derive(&msg, &requester, 100, 0),
            msg,
            requester,
            100,
            50,
            None,
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = session();
        assert_eq!(s.expires_at_ms, 150);
        assert!(s.transition(SessionStatus::InProgress, 110));
        assert!(s.finished_at_ms.is_none());
        assert!(s.transition(SessionStatus::Complete, 120));
        assert_eq!(s.finished_at_ms, Some(120));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for terminal in [
            SessionStatus::Complete,
            SessionStatus::Failed,
            SessionStatus::Expired,
        ] {
            for next in [
                SessionStatus::Pending,
                SessionStatus::InProgress,
                SessionStatus::Complete,
                SessionStatus::Failed,
                SessionStatus::Expired,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut s = session();
        assert!(!s.transition(SessionStatus::Complete, 110));
        assert!(!s.transition(SessionStatus::Failed, 110));
        assert_eq!(s.status(), SessionStatus::Pending);
        assert!(s.transition(SessionStatus::Expired, 200));
    }

    #[test]
    fn test_deadline_is_exclusive() {
        let s = session();
        assert!(!s.is_past_deadline(150));
        assert!(s.is_past_deadline(151));
    }
}
