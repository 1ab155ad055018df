//! Signing session manager
//!
//! Owns every `SigningSession` and drives it from request to completion:
//!
//! 1. `request_signature` admits a session (bounded by `max_pending_signs`)
//!    and queues a `SigningTask` for the transport worker.
//! 2. Remote signers answer through `submit_partial_signature`. When the
//!    number of distinct contributors reaches the registry threshold, the
//!    shares are snapshotted and the bookkeeping lock is released.
//! 3. The combiner runs unlocked. Its result is committed under a fresh lock
//!    only if the session is still InProgress, so a concurrent expiry wins
//!    over a late combine. If the submitting future is dropped mid-combine,
//!    the in-flight mark is cleared and the next submission combines again.
//! 4. Completion queues a `CallbackTask` for the callback worker. Callers
//!    observe completion only by polling `get_signature`.
//!
//! ## Lock order
//!
//! Session table, then registry. The registry never calls back into the
//! manager, and no lock is held across an await.

use crate::registry::SignerRegistry;
use crate::session::{SessionStats, SessionStatus, SessionView, SigningSession};
use crate::workers::WorkerQueues;
use parking_lot::RwLock;
use quorum_core::{
    CallbackRequest, CallbackTask, ChainAddress, Combiner, Hash32, NodeId, PhysicalTimeEffects,
    QuorumConfig, QuorumError, Result, SessionId, SigningTask,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<SessionId, SigningSession>,
    /// Sessions in Pending or InProgress
    live: usize,
}

impl SessionTable {
    /// Transition a session, keeping the live count in step.
    fn transition(&mut self, id: &SessionId, next: SessionStatus, now_ms: u64) -> bool {
        let Some(session) = self.sessions.get_mut(id) else {
            return false;
        };
        let was_live = !session.status().is_terminal();
        let applied = session.transition(next, now_ms);
        if applied && was_live && next.is_terminal() {
            self.live = self.live.saturating_sub(1);
        }
        applied
    }
}

/// Shares snapshotted for a combine call
struct CombineJob {
    shares: BTreeMap<NodeId, Vec<u8>>,
    threshold: u32,
    total_signers: u32,
    started_at_ms: u64,
}

/// Clears `combine_in_flight` if the combining future is dropped before it
/// commits, so a later submission can run the combine again.
struct InFlightGuard<'a> {
    table: &'a RwLock<SessionTable>,
    session_id: SessionId,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(session) = self.table.write().sessions.get_mut(&self.session_id) {
            session.combine_in_flight = false;
        }
        warn!(session_id = %self.session_id, "Combine abandoned before commit; next submission retries");
    }
}

/// Signing session manager
pub struct SessionManager {
    max_pending_signs: usize,
    sign_timeout_ms: u64,
    registry: Arc<SignerRegistry>,
    combiner: Arc<dyn Combiner>,
    time: Arc<dyn PhysicalTimeEffects>,
    table: RwLock<SessionTable>,
    request_nonce: AtomicU64,
    signing_tx: mpsc::Sender<SigningTask>,
    callback_tx: mpsc::Sender<CallbackTask>,
}

impl SessionManager {
    /// Create a manager and the queues its worker loops consume.
    pub fn new(
        config: &QuorumConfig,
        registry: Arc<SignerRegistry>,
        combiner: Arc<dyn Combiner>,
        time: Arc<dyn PhysicalTimeEffects>,
    ) -> (Self, WorkerQueues) {
        let capacity = config.max_pending_signs.max(1);
        let (signing_tx, signing_rx) = mpsc::channel(capacity);
        let (callback_tx, callback_rx) = mpsc::channel(capacity);

        let manager = Self {
            max_pending_signs: config.max_pending_signs,
            sign_timeout_ms: config.sign_timeout_ms,
            registry,
            combiner,
            time,
            table: RwLock::new(SessionTable::default()),
            request_nonce: AtomicU64::new(0),
            signing_tx,
            callback_tx,
        };
        let queues = WorkerQueues {
            signing: signing_rx,
            callbacks: callback_rx,
        };
        (manager, queues)
    }

    /// Registry this manager validates submitters against
    pub fn registry(&self) -> &Arc<SignerRegistry> {
        &self.registry
    }

    /// Open a signing session for `message_hash`.
    ///
    /// Returns the session id immediately; the signature is produced
    /// asynchronously and must be polled with `get_signature`.
    pub async fn request_signature(
        &self,
        requester: ChainAddress,
        message_hash: Hash32,
        callback: Option<CallbackRequest>,
    ) -> Result<SessionId> {
        let now_ms = self.time.now_ms().await?;

        let task = {
            let mut table = self.table.write();

            if table.live >= self.max_pending_signs {
                warn!(
                    live = table.live,
                    limit = self.max_pending_signs,
                    "Signing request rejected by admission control"
                );
                return Err(QuorumError::TooManyPending {
                    limit: self.max_pending_signs,
                });
            }

            let eligible_signers = self.registry.active_signers();
            if eligible_signers.is_empty() {
                return Err(QuorumError::NoActiveSigners);
            }

            let nonce = self.request_nonce.fetch_add(1, Ordering::Relaxed);
            let id = SessionId::derive(&message_hash, &requester, now_ms, nonce);
            let session = SigningSession::new(
                id,
                message_hash,
                requester,
                now_ms,
                self.sign_timeout_ms,
                callback,
            );
            let expires_at_ms = session.expires_at_ms;
            table.sessions.insert(id, session);
            table.live += 1;

            SigningTask {
                session_id: id,
                message_hash,
                eligible_signers,
                expires_at_ms,
            }
        };

        let session_id = task.session_id;
        info!(
            session_id = %session_id,
            requester = %requester,
            message_hash = %message_hash,
            signers = task.eligible_signers.len(),
            expires_at_ms = task.expires_at_ms,
            "Signing session opened"
        );

        match self.signing_tx.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(session_id = %session_id, "Transport queue full; session will expire undelivered");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(session_id = %session_id, "Transport worker stopped; session will expire undelivered");
            }
        }

        Ok(session_id)
    }

    /// Accept a partial signature from `node_id`.
    ///
    /// Returns the session status after the submission. When this share
    /// brings the session to quorum, the combine runs before returning and a
    /// combine failure is reported to this caller (and recorded on the
    /// session).
    pub async fn submit_partial_signature(
        &self,
        session_id: &SessionId,
        node_id: NodeId,
        partial_signature: Vec<u8>,
    ) -> Result<SessionStatus> {
        let now_ms = self.time.now_ms().await?;

        let job = {
            let mut table = self.table.write();
            let session = table
                .sessions
                .get(session_id)
                .ok_or(QuorumError::SessionNotFound {
                    session_id: *session_id,
                })?;

            let status = session.status();
            if status.is_terminal() {
                return Err(QuorumError::SessionNotAcceptingInput {
                    session_id: *session_id,
                    status: status.to_string(),
                });
            }

            if session.is_past_deadline(now_ms) {
                let expired_at_ms = session.expires_at_ms;
                table.transition(session_id, SessionStatus::Expired, now_ms);
                warn!(session_id = %session_id, node_id = %node_id, "Submission after deadline; session expired");
                return Err(QuorumError::SessionExpired {
                    session_id: *session_id,
                    expired_at_ms,
                });
            }

            if !self.registry.is_active_signer(&node_id) {
                warn!(session_id = %session_id, node_id = %node_id, "Submission from non-active signer");
                return Err(QuorumError::UnauthorizedSigner { node_id });
            }

            if status == SessionStatus::Pending {
                table.transition(session_id, SessionStatus::InProgress, now_ms);
            }

            let (threshold, active_count) = self.registry.quorum();
            let Some(session) = table.sessions.get_mut(session_id) else {
                return Err(QuorumError::SessionNotFound {
                    session_id: *session_id,
                });
            };

            let first_share = session
                .partial_signatures
                .insert(node_id, partial_signature)
                .is_none();
            if first_share {
                self.registry.record_participation(&node_id, now_ms);
            }

            let collected = session.partial_signatures.len();
            debug!(
                session_id = %session_id,
                node_id = %node_id,
                collected,
                threshold,
                "Partial signature accepted"
            );

            if collected < threshold as usize || session.combine_in_flight {
                return Ok(session.status());
            }

            session.combine_in_flight = true;
            CombineJob {
                shares: session.partial_signatures.clone(),
                threshold,
                total_signers: u32::try_from(active_count).unwrap_or(u32::MAX),
                started_at_ms: now_ms,
            }
        };

        self.finish_combine(session_id, job).await
    }

    /// Run the combiner unlocked, then commit the result if the session is
    /// still InProgress.
    async fn finish_combine(&self, session_id: &SessionId, job: CombineJob) -> Result<SessionStatus> {
        debug!(
            session_id = %session_id,
            scheme = self.combiner.scheme_name(),
            shares = job.shares.len(),
            threshold = job.threshold,
            "Quorum reached; combining"
        );
        let mut guard = InFlightGuard {
            table: &self.table,
            session_id: *session_id,
            armed: true,
        };
        let result = self
            .combiner
            .combine(&job.shares, job.threshold, job.total_signers)
            .await;
        let now_ms = self.time.now_ms().await.unwrap_or(job.started_at_ms);
        // No await from here on, so the commit below cannot be abandoned
        guard.armed = false;

        let mut table = self.table.write();
        let Some(session) = table.sessions.get_mut(session_id) else {
            return Err(QuorumError::SessionNotFound {
                session_id: *session_id,
            });
        };
        session.combine_in_flight = false;

        if session.status() != SessionStatus::InProgress {
            warn!(
                session_id = %session_id,
                status = %session.status(),
                "Session left InProgress during combine; result discarded"
            );
            return Ok(session.status());
        }

        match result {
            Ok(signature) => {
                session.final_signature = Some(signature.clone());
                let callback = session.callback.clone();
                table.transition(session_id, SessionStatus::Complete, now_ms);
                drop(table);

                info!(session_id = %session_id, signature_len = signature.len(), "Signing session complete");
                if let Some(cb) = callback {
                    self.enqueue_callback(CallbackTask {
                        session_id: *session_id,
                        target: cb.target,
                        payload: cb.payload,
                        signature,
                    });
                }
                Ok(SessionStatus::Complete)
            }
            Err(e) => {
                session.failure = Some(e.to_string());
                table.transition(session_id, SessionStatus::Failed, now_ms);
                warn!(session_id = %session_id, error = %e, "Combine failed; session failed");
                Err(e.into())
            }
        }
    }

    fn enqueue_callback(&self, task: CallbackTask) {
        let session_id = task.session_id;
        if let Err(e) = self.callback_tx.try_send(task) {
            let reason = match e {
                TrySendError::Full(_) => "queue full",
                TrySendError::Closed(_) => "worker stopped",
            };
            warn!(session_id = %session_id, reason, "Callback dropped");
        }
    }

    /// Poll a session's status and signature
    pub fn get_signature(&self, session_id: &SessionId) -> Result<SessionView> {
        self.table
            .read()
            .sessions
            .get(session_id)
            .map(SigningSession::view)
            .ok_or(QuorumError::SessionNotFound {
                session_id: *session_id,
            })
    }

    /// Expire every Pending/InProgress session whose deadline is before
    /// `now_ms`. Idempotent; returns how many sessions were expired.
    pub fn expiry_sweep(&self, now_ms: u64) -> usize {
        let mut table = self.table.write();
        let stale: Vec<SessionId> = table
            .sessions
            .values()
            .filter(|s| !s.status().is_terminal() && s.expires_at_ms < now_ms)
            .map(|s| s.id)
            .collect();

        let mut expired = 0;
        for id in &stale {
            if table.transition(id, SessionStatus::Expired, now_ms) {
                expired += 1;
            }
        }
        if expired > 0 {
            info!(expired, live = table.live, "Expired stale signing sessions");
        }
        expired
    }

    /// Drop terminal sessions that finished more than `retention_ms` before
    /// `now_ms`. Live sessions are never pruned.
    pub fn prune_terminal(&self, now_ms: u64, retention_ms: u64) -> usize {
        let mut table = self.table.write();
        let before = table.sessions.len();
        table.sessions.retain(|_, s| match s.finished_at_ms {
            Some(finished) if s.status().is_terminal() => {
                now_ms.saturating_sub(finished) <= retention_ms
            }
            _ => true,
        });
        let pruned = before - table.sessions.len();
        if pruned > 0 {
            debug!(pruned, "Pruned terminal signing sessions");
        }
        pruned
    }

    /// Number of sessions counting against admission control
    pub fn live_sessions(&self) -> usize {
        self.table.read().live
    }

    /// Session counts by status
    pub fn stats(&self) -> SessionStats {
        let table = self.table.read();
        let mut stats = SessionStats::default();
        for session in table.sessions.values() {
            match session.status() {
                SessionStatus::Pending => stats.pending += 1,
                SessionStatus::InProgress => stats.in_progress += 1,
                SessionStatus::Complete => stats.complete += 1,
                SessionStatus::Failed => stats.failed += 1,
                SessionStatus::Expired => stats.expired += 1,
            }
        }
        stats
    }
}
