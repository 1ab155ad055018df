//! Signing service wiring
//!
//! `SigningService` is the explicitly constructed instance a host owns: one
//! registry, one session manager and the three background loops (transport
//! worker, callback worker, expiry sweeper) spawned on the current Tokio
//! runtime. There is no global state; hosts may run several services side by
//! side.

use crate::manager::SessionManager;
use crate::registry::{GroupKey, Signer, SignerRegistry, SignerSetView, SignerStatus, SlashOutcome};
use crate::session::{SessionStats, SessionStatus, SessionView};
use crate::sweeper::ExpirySweeper;
use crate::workers::{run_callback_worker, run_transport_worker};
use quorum_core::{
    BondAmount, CallbackEffects, CallbackRequest, ChainAddress, Combiner, Hash32, NodeId,
    PhysicalTimeEffects, QuorumConfig, QuorumError, Result, SessionId, SignerTransport,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Registry, session manager and background loops for one signer set
pub struct SigningService {
    config: QuorumConfig,
    registry: Arc<SignerRegistry>,
    manager: Arc<SessionManager>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SigningService {
    /// Validate `config`, build the registry and manager, and spawn the
    /// background loops. Must be called from within a Tokio runtime.
    pub fn start(
        config: QuorumConfig,
        combiner: Arc<dyn Combiner>,
        transport: Arc<dyn SignerTransport>,
        callbacks: Arc<dyn CallbackEffects>,
        time: Arc<dyn PhysicalTimeEffects>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(SignerRegistry::new(&config, time.clone()));
        let (manager, queues) =
            SessionManager::new(&config, registry.clone(), combiner.clone(), time.clone());
        let manager = Arc::new(manager);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transport_stop = shutdown_rx.clone();
        let callback_stop = shutdown_rx.clone();
        let sweeper = ExpirySweeper::new(
            manager.clone(),
            time,
            config.sweep_interval_ms,
            config.session_retention_ms,
        );

        let tasks = vec![
            tokio::spawn(async move {
                run_transport_worker(queues.signing, transport, transport_stop).await;
            }),
            tokio::spawn(async move {
                run_callback_worker(queues.callbacks, callbacks, callback_stop).await;
            }),
            tokio::spawn(sweeper.run(shutdown_rx)),
        ];

        info!(
            scheme = combiner.scheme_name(),
            max_signers = config.max_signers,
            max_pending_signs = config.max_pending_signs,
            sign_timeout_ms = config.sign_timeout_ms,
            "Signing service started"
        );

        Ok(Self {
            config,
            registry,
            manager,
            shutdown_tx,
            tasks,
        })
    }

    /// Validated configuration the service was started with
    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Shared signer registry
    pub fn registry(&self) -> &Arc<SignerRegistry> {
        &self.registry
    }

    /// Shared session manager
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Admit a signer as Active, or waitlist it when the set is full
    pub async fn register_signer(
        &self,
        node_id: NodeId,
        address: ChainAddress,
        public_key_share: Vec<u8>,
        bond: BondAmount,
    ) -> Result<SignerStatus> {
        self.registry
            .register_signer(node_id, address, public_key_share, bond)
            .await
    }

    /// Remove an Active or waitlisted signer
    pub async fn remove_signer(&self, node_id: &NodeId) -> Result<()> {
        self.registry.remove_signer(node_id).await
    }

    /// Slash a signer's bond by `percent_basis_points / 10000`
    pub async fn slash_signer(
        &self,
        node_id: &NodeId,
        percent_basis_points: u32,
    ) -> Result<SlashOutcome> {
        self.registry.slash_signer(node_id, percent_basis_points).await
    }

    /// Snapshot of the signer set
    pub fn get_signer_set(&self) -> SignerSetView {
        self.registry.signer_set()
    }

    /// One signer's record, including Removed and Slashed signers
    pub fn get_signer(&self, node_id: &NodeId) -> Result<Signer> {
        self.registry
            .signer(node_id)
            .ok_or(QuorumError::SignerNotFound { node_id: *node_id })
    }

    /// Group key installed for the current epoch, if any
    pub fn get_public_key(&self) -> Option<GroupKey> {
        self.registry.public_key()
    }

    /// Record the group key produced by the resharing ceremony for `epoch`
    pub fn install_group_key(&self, epoch: u64, public_key: Vec<u8>) -> Result<()> {
        self.registry.install_group_key(epoch, public_key)
    }

    /// Open a signing session; see [`SessionManager::request_signature`]
    pub async fn request_signature(
        &self,
        requester: ChainAddress,
        message_hash: Hash32,
        callback: Option<CallbackRequest>,
    ) -> Result<SessionId> {
        self.manager
            .request_signature(requester, message_hash, callback)
            .await
    }

    /// Submit one signer's share; see [`SessionManager::submit_partial_signature`]
    pub async fn submit_partial_signature(
        &self,
        session_id: &SessionId,
        node_id: NodeId,
        partial_signature: Vec<u8>,
    ) -> Result<SessionStatus> {
        self.manager
            .submit_partial_signature(session_id, node_id, partial_signature)
            .await
    }

    /// Poll a session's status and signature
    pub fn get_signature(&self, session_id: &SessionId) -> Result<SessionView> {
        self.manager.get_signature(session_id)
    }

    /// Session counts by status
    pub fn session_stats(&self) -> SessionStats {
        self.manager.stats()
    }

    /// Signal the background loops to stop and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Signing service stopped");
    }
}
