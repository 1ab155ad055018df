//! Bonded signer registry
//!
//! Owns the signer set: the ordered Active list (capped at `max_signers`),
//! the FIFO waitlist, the quorum threshold and the resharing epoch.
//!
//! ## Invariants
//!
//! - `|active| <= max_signers`
//! - `threshold == floor(2 * |active| / 3) + 1`, recomputed on every
//!   membership change (so it is 1 with zero signers)
//! - no `NodeId` appears twice in `active ∪ waitlist`
//! - signer records are never deleted; removal and slashing are status
//!   transitions so historical stats survive
//!
//! Removing an Active signer while the waitlist is non-empty promotes the
//! waitlist head. A promotion brings a new key holder into the set, so it
//! bumps the epoch once, clears the installed group key and stamps the
//! resharing time. A removal with an empty waitlist only shrinks the set and
//! the threshold. The resharing ceremony itself runs elsewhere and reports
//! back via `install_group_key`.

use parking_lot::RwLock;
use quorum_core::{
    BondAmount, ChainAddress, NodeId, PhysicalTimeEffects, QuorumConfig, QuorumError, Result,
    BASIS_POINTS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Quorum size for `active` signers: `floor(2n/3) + 1`.
pub fn threshold_for(active: usize) -> u32 {
    let t = (2 * active) / 3 + 1;
    u32::try_from(t).unwrap_or(u32::MAX)
}

/// Membership status of a signer record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignerStatus {
    /// Counts toward the quorum and may sign
    Active,
    /// Queued for a free Active slot
    Waitlisted,
    /// Removed after its bond fell below the floor
    Slashed,
    /// Removed voluntarily
    Removed,
}

impl fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignerStatus::Active => "active",
            SignerStatus::Waitlisted => "waitlisted",
            SignerStatus::Slashed => "slashed",
            SignerStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// A bonded signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    /// Signer identity
    pub node_id: NodeId,
    /// Chain address that posted the bond
    pub address: ChainAddress,
    /// Share of the group public key
    pub public_key_share: Vec<u8>,
    /// Remaining collateral
    pub bond: BondAmount,
    /// When the signer first registered
    pub joined_at_ms: u64,
    /// Last accepted partial signature, or the join time
    pub last_active_ms: u64,
    /// Partial signatures accepted from this signer, across all sessions
    pub sign_count: u64,
    /// Times this signer has been slashed
    pub slash_count: u32,
    /// Membership status
    pub status: SignerStatus,
}

/// Result of a slashing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashOutcome {
    /// Amount deducted from the bond
    pub slashed: BondAmount,
    /// Bond left after slashing
    pub remaining_bond: BondAmount,
    /// Whether the signer fell below the bond floor and was removed
    pub removed: bool,
}

/// Combined public key installed for an epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKey {
    /// Epoch the key was produced for
    pub epoch: u64,
    /// Encoded group public key
    pub public_key: Vec<u8>,
}

/// Read-only snapshot of the signer set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSetView {
    /// Active signers in admission order
    pub active: Vec<Signer>,
    /// Waitlisted node ids, head first
    pub waitlist: Vec<NodeId>,
    /// Current quorum size
    pub threshold: u32,
    /// Resharing epoch
    pub epoch: u64,
    /// When the last waitlist promotion happened
    pub last_reshare_ms: Option<u64>,
    /// Group key for the current epoch, if installed
    pub group_key: Option<GroupKey>,
}

#[derive(Debug, Default)]
struct SignerSet {
    signers: BTreeMap<NodeId, Signer>,
    active: Vec<NodeId>,
    waitlist: VecDeque<NodeId>,
    threshold: u32,
    group_key: Option<GroupKey>,
    epoch: u64,
    last_reshare_ms: Option<u64>,
}

impl SignerSet {
    fn recompute_threshold(&mut self) {
        self.threshold = threshold_for(self.active.len());
    }

    fn is_member(&self, node_id: &NodeId) -> bool {
        self.signers.get(node_id).is_some_and(|s| {
            matches!(s.status, SignerStatus::Active | SignerStatus::Waitlisted)
        })
    }

    /// Drop `node_id` from the Active list or the waitlist, marking the record
    /// with `final_status`.
    fn remove_member(
        &mut self,
        node_id: &NodeId,
        final_status: SignerStatus,
        now_ms: u64,
    ) -> Result<()> {
        if let Some(pos) = self.active.iter().position(|id| id == node_id) {
            self.active.remove(pos);
            self.set_status(node_id, final_status);

            let promoted = self.waitlist.pop_front();
            if let Some(next) = promoted {
                self.active.push(next);
                self.set_status(&next, SignerStatus::Active);
                self.epoch += 1;
                self.last_reshare_ms = Some(now_ms);
                self.group_key = None;
            }
            self.recompute_threshold();

            match promoted {
                Some(next) => info!(
                    node_id = %node_id,
                    status = %final_status,
                    promoted = %next,
                    epoch = self.epoch,
                    threshold = self.threshold,
                    active = self.active.len(),
                    "Signer left active set; waitlist head promoted, resharing required"
                ),
                None => info!(
                    node_id = %node_id,
                    status = %final_status,
                    threshold = self.threshold,
                    active = self.active.len(),
                    "Signer left active set"
                ),
            }
            return Ok(());
        }

        if let Some(pos) = self.waitlist.iter().position(|id| id == node_id) {
            self.waitlist.remove(pos);
            self.set_status(node_id, final_status);
            info!(node_id = %node_id, status = %final_status, "Signer left waitlist");
            return Ok(());
        }

        Err(QuorumError::SignerNotFound { node_id: *node_id })
    }

    fn set_status(&mut self, node_id: &NodeId, status: SignerStatus) {
        if let Some(signer) = self.signers.get_mut(node_id) {
            signer.status = status;
        }
    }
}

/// Registry of bonded signers
///
/// Reads (threshold, membership, views) share a read lock; every mutation is
/// exclusive. The lock is never held across an await.
pub struct SignerRegistry {
    max_signers: usize,
    min_signer_bond: BondAmount,
    time: Arc<dyn PhysicalTimeEffects>,
    state: RwLock<SignerSet>,
}

impl SignerRegistry {
    /// Create an empty registry
    pub fn new(config: &QuorumConfig, time: Arc<dyn PhysicalTimeEffects>) -> Self {
        Self {
            max_signers: config.max_signers,
            min_signer_bond: config.min_signer_bond,
            time,
            state: RwLock::new(SignerSet {
                threshold: threshold_for(0),
                ..SignerSet::default()
            }),
        }
    }

    /// Minimum bond required to join or stay Active
    pub fn min_signer_bond(&self) -> BondAmount {
        self.min_signer_bond
    }

    /// Register a signer, admitting it Active if there is room and
    /// waitlisting it otherwise. Returns the status it was given.
    pub async fn register_signer(
        &self,
        node_id: NodeId,
        address: ChainAddress,
        public_key_share: Vec<u8>,
        bond: BondAmount,
    ) -> Result<SignerStatus> {
        if bond < self.min_signer_bond {
            return Err(QuorumError::InsufficientBond {
                bond,
                minimum: self.min_signer_bond,
            });
        }

        let now_ms = self.time.now_ms().await?;
        let mut set = self.state.write();

        if set.is_member(&node_id) {
            return Err(QuorumError::AlreadySigner { node_id });
        }

        let status = if set.active.len() < self.max_signers {
            SignerStatus::Active
        } else {
            SignerStatus::Waitlisted
        };

        // Returning nodes keep their historical counters
        let (sign_count, slash_count) = set
            .signers
            .get(&node_id)
            .map(|prev| (prev.sign_count, prev.slash_count))
            .unwrap_or((0, 0));

        set.signers.insert(
            node_id,
            Signer {
                node_id,
                address,
                public_key_share,
                bond,
                joined_at_ms: now_ms,
                last_active_ms: now_ms,
                sign_count,
                slash_count,
                status,
            },
        );

        match status {
            SignerStatus::Active => {
                set.active.push(node_id);
                set.recompute_threshold();
                info!(
                    node_id = %node_id,
                    active = set.active.len(),
                    threshold = set.threshold,
                    "Signer admitted"
                );
            }
            _ => {
                set.waitlist.push_back(node_id);
                info!(
                    node_id = %node_id,
                    position = set.waitlist.len(),
                    "Signer set full; signer waitlisted"
                );
            }
        }

        Ok(status)
    }

    /// Remove an Active or Waitlisted signer
    pub async fn remove_signer(&self, node_id: &NodeId) -> Result<()> {
        let now_ms = self.time.now_ms().await?;
        let mut set = self.state.write();
        set.remove_member(node_id, SignerStatus::Removed, now_ms)
    }

    /// Slash `percent_basis_points / 10000` of a signer's bond.
    ///
    /// Percentages above 100% are clamped. A signer whose bond falls below
    /// the floor is marked Slashed and removed; that path never errors.
    pub async fn slash_signer(
        &self,
        node_id: &NodeId,
        percent_basis_points: u32,
    ) -> Result<SlashOutcome> {
        let now_ms = self.time.now_ms().await?;
        let mut set = self.state.write();

        if !set.is_member(node_id) {
            return Err(QuorumError::SignerNotFound { node_id: *node_id });
        }

        let bps = percent_basis_points.min(BASIS_POINTS);
        let Some(signer) = set.signers.get_mut(node_id) else {
            return Err(QuorumError::SignerNotFound { node_id: *node_id });
        };

        let slashed = slash_amount(signer.bond, bps);
        signer.bond -= slashed;
        signer.slash_count = signer.slash_count.saturating_add(1);
        let remaining_bond = signer.bond;

        warn!(
            node_id = %node_id,
            basis_points = bps,
            slashed = %slashed,
            remaining = %remaining_bond,
            "Signer slashed"
        );

        let removed = remaining_bond < self.min_signer_bond;
        if removed {
            set.remove_member(node_id, SignerStatus::Slashed, now_ms)?;
        }

        Ok(SlashOutcome {
            slashed,
            remaining_bond,
            removed,
        })
    }

    /// Current quorum size (at least 1, even with no signers)
    pub fn threshold(&self) -> u32 {
        self.state.read().threshold
    }

    /// Threshold and Active count read under one guard, so the pair is
    /// always consistent
    pub fn quorum(&self) -> (u32, usize) {
        let set = self.state.read();
        (set.threshold, set.active.len())
    }

    /// Whether `node_id` is currently Active
    pub fn is_active_signer(&self, node_id: &NodeId) -> bool {
        self.state
            .read()
            .signers
            .get(node_id)
            .is_some_and(|s| s.status == SignerStatus::Active)
    }

    /// Number of Active signers
    pub fn active_count(&self) -> usize {
        self.state.read().active.len()
    }

    /// Active signer ids in admission order
    pub fn active_signers(&self) -> Vec<NodeId> {
        self.state.read().active.clone()
    }

    /// Current resharing epoch
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Look up a signer record, including Removed and Slashed ones
    pub fn signer(&self, node_id: &NodeId) -> Option<Signer> {
        self.state.read().signers.get(node_id).cloned()
    }

    /// Snapshot of the whole signer set
    pub fn signer_set(&self) -> SignerSetView {
        let set = self.state.read();
        SignerSetView {
            active: set
                .active
                .iter()
                .filter_map(|id| set.signers.get(id).cloned())
                .collect(),
            waitlist: set.waitlist.iter().copied().collect(),
            threshold: set.threshold,
            epoch: set.epoch,
            last_reshare_ms: set.last_reshare_ms,
            group_key: set.group_key.clone(),
        }
    }

    /// Combined public key for the current epoch, if one was installed
    pub fn public_key(&self) -> Option<GroupKey> {
        self.state.read().group_key.clone()
    }

    /// Record the combined key produced by the resharing ceremony for `epoch`
    pub fn install_group_key(&self, epoch: u64, public_key: Vec<u8>) -> Result<()> {
        if public_key.is_empty() {
            return Err(QuorumError::invalid("group public key is empty"));
        }
        let mut set = self.state.write();
        if epoch != set.epoch {
            return Err(QuorumError::invalid(format!(
                "group key for epoch {epoch} does not match current epoch {}",
                set.epoch
            )));
        }
        info!(epoch, key_len = public_key.len(), "Group public key installed");
        set.group_key = Some(GroupKey { epoch, public_key });
        Ok(())
    }

    /// Bump participation stats for an accepted partial signature
    pub fn record_participation(&self, node_id: &NodeId, now_ms: u64) {
        let mut set = self.state.write();
        if let Some(signer) = set.signers.get_mut(node_id) {
            signer.sign_count = signer.sign_count.saturating_add(1);
            signer.last_active_ms = signer.last_active_ms.max(now_ms);
            debug!(node_id = %node_id, sign_count = signer.sign_count, "Participation recorded");
        }
    }
}

/// `bond * bps / 10000` without overflowing for large bonds.
fn slash_amount(bond: BondAmount, bps: u32) -> BondAmount {
    let bps = BondAmount::from(bps);
    let denom = BondAmount::from(BASIS_POINTS);
    (bond / denom) * bps + (bond % denom) * bps / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_testkit::{node_id, test_address, ControllableClock};

    const MIN_BOND: BondAmount = 1_000;

    fn registry(max_signers: usize) -> (SignerRegistry, Arc<ControllableClock>) {
        let clock = Arc::new(ControllableClock::new(1_000));
        let config = QuorumConfig {
            max_signers,
            min_signer_bond: MIN_BOND,
            ..QuorumConfig::default()
        };
        (SignerRegistry::new(&config, clock.clone()), clock)
    }

    async fn register(reg: &SignerRegistry, i: u8, bond: BondAmount) -> Result<SignerStatus> {
        reg.register_signer(node_id(i), test_address(i), vec![i; 32], bond)
            .await
    }

    #[test]
    fn test_threshold_formula() {
        assert_eq!(threshold_for(0), 1);
        assert_eq!(threshold_for(1), 1);
        assert_eq!(threshold_for(2), 2);
        assert_eq!(threshold_for(3), 3);
        assert_eq!(threshold_for(4), 3);
        assert_eq!(threshold_for(5), 4);
        assert_eq!(threshold_for(100), 67);
    }

    #[test]
    fn test_slash_amount_handles_large_bonds() {
        assert_eq!(slash_amount(1_000, 10_000), 1_000);
        assert_eq!(slash_amount(1_000, 2_500), 250);
        assert_eq!(slash_amount(9_999, 1), 0);
        assert_eq!(slash_amount(BondAmount::MAX, 10_000), BondAmount::MAX);
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let (reg, _) = registry(10);
        assert_eq!(register(&reg, 1, MIN_BOND).await.unwrap(), SignerStatus::Active);
        assert_eq!(reg.active_count(), 1);

        let err = register(&reg, 1, MIN_BOND).await.unwrap_err();
        assert_eq!(err, QuorumError::AlreadySigner { node_id: node_id(1) });
        assert_eq!(reg.active_count(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_bond() {
        let (reg, _) = registry(10);
        let err = register(&reg, 1, MIN_BOND - 1).await.unwrap_err();
        assert!(matches!(err, QuorumError::InsufficientBond { .. }));
        assert_eq!(reg.active_count(), 0);
        assert!(reg.signer(&node_id(1)).is_none());
    }

    #[tokio::test]
    async fn test_waitlist_when_full() {
        let (reg, _) = registry(2);
        register(&reg, 1, MIN_BOND).await.unwrap();
        register(&reg, 2, MIN_BOND).await.unwrap();
        assert_eq!(
            register(&reg, 3, MIN_BOND).await.unwrap(),
            SignerStatus::Waitlisted
        );
        assert_eq!(reg.active_count(), 2);
        assert!(!reg.is_active_signer(&node_id(3)));

        // Waitlisted nodes also count as duplicates
        assert!(matches!(
            register(&reg, 3, MIN_BOND).await,
            Err(QuorumError::AlreadySigner { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_promotes_waitlist_head() {
        let (reg, clock) = registry(2);
        for i in 1..=4 {
            register(&reg, i, MIN_BOND).await.unwrap();
        }
        clock.set_ms(5_000);

        reg.remove_signer(&node_id(1)).await.unwrap();

        let view = reg.signer_set();
        assert_eq!(
            view.active.iter().map(|s| s.node_id).collect::<Vec<_>>(),
            vec![node_id(2), node_id(3)]
        );
        assert_eq!(view.waitlist, vec![node_id(4)]);
        assert_eq!(view.epoch, 1);
        assert_eq!(view.last_reshare_ms, Some(5_000));
        assert_eq!(reg.signer(&node_id(1)).unwrap().status, SignerStatus::Removed);
    }

    #[tokio::test]
    async fn test_remove_without_waitlist_recomputes_threshold() {
        let (reg, _) = registry(10);
        for i in 1..=5 {
            register(&reg, i, MIN_BOND).await.unwrap();
        }
        assert_eq!(reg.threshold(), 4);

        reg.remove_signer(&node_id(5)).await.unwrap();
        assert_eq!(reg.active_count(), 4);
        assert_eq!(reg.threshold(), 3);
        assert_eq!(reg.epoch(), 0);
        assert_eq!(reg.signer_set().last_reshare_ms, None);
    }

    #[tokio::test]
    async fn test_quorum_pair_tracks_membership() {
        let (reg, _) = registry(10);
        assert_eq!(reg.quorum(), (1, 0));
        for i in 1..=3 {
            register(&reg, i, MIN_BOND).await.unwrap();
        }
        assert_eq!(reg.quorum(), (3, 3));
        reg.remove_signer(&node_id(3)).await.unwrap();
        assert_eq!(reg.quorum(), (2, 2));
    }

    #[tokio::test]
    async fn test_remove_waitlisted_keeps_epoch() {
        let (reg, _) = registry(1);
        register(&reg, 1, MIN_BOND).await.unwrap();
        register(&reg, 2, MIN_BOND).await.unwrap();

        reg.remove_signer(&node_id(2)).await.unwrap();
        assert_eq!(reg.epoch(), 0);
        assert!(reg.signer_set().waitlist.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_signer() {
        let (reg, _) = registry(10);
        let err = reg.remove_signer(&node_id(9)).await.unwrap_err();
        assert_eq!(err, QuorumError::SignerNotFound { node_id: node_id(9) });
    }

    #[tokio::test]
    async fn test_partial_slash_keeps_signer_active() {
        let (reg, _) = registry(10);
        register(&reg, 1, 2 * MIN_BOND).await.unwrap();

        let outcome = reg.slash_signer(&node_id(1), 2_500).await.unwrap();
        assert_eq!(outcome.slashed, 500);
        assert_eq!(outcome.remaining_bond, 1_500);
        assert!(!outcome.removed);

        let signer = reg.signer(&node_id(1)).unwrap();
        assert_eq!(signer.status, SignerStatus::Active);
        assert_eq!(signer.slash_count, 1);
        assert_eq!(reg.epoch(), 0);
    }

    #[tokio::test]
    async fn test_full_slash_removes_and_promotes() {
        let (reg, _) = registry(3);
        for i in 1..=4 {
            register(&reg, i, MIN_BOND).await.unwrap();
        }

        let outcome = reg.slash_signer(&node_id(2), 10_000).await.unwrap();
        assert_eq!(outcome.remaining_bond, 0);
        assert!(outcome.removed);

        let slashed = reg.signer(&node_id(2)).unwrap();
        assert_eq!(slashed.status, SignerStatus::Slashed);
        assert_eq!(slashed.bond, 0);
        assert_eq!(reg.epoch(), 1);
        assert!(reg.is_active_signer(&node_id(4)));
        assert_eq!(reg.active_count(), 3);
    }

    #[tokio::test]
    async fn test_reregistration_keeps_history() {
        let (reg, _) = registry(10);
        register(&reg, 1, MIN_BOND).await.unwrap();
        reg.record_participation(&node_id(1), 2_000);
        reg.slash_signer(&node_id(1), 10_000).await.unwrap();

        assert_eq!(register(&reg, 1, MIN_BOND).await.unwrap(), SignerStatus::Active);
        let signer = reg.signer(&node_id(1)).unwrap();
        assert_eq!(signer.sign_count, 1);
        assert_eq!(signer.slash_count, 1);
    }

    #[tokio::test]
    async fn test_group_key_lifecycle() {
        let (reg, _) = registry(2);
        for i in 1..=4 {
            register(&reg, i, MIN_BOND).await.unwrap();
        }

        reg.install_group_key(0, vec![7; 32]).unwrap();
        assert_eq!(reg.public_key().unwrap().epoch, 0);

        // Leaving the waitlist does not touch the key
        reg.remove_signer(&node_id(4)).await.unwrap();
        assert_eq!(reg.public_key().unwrap().epoch, 0);

        reg.remove_signer(&node_id(2)).await.unwrap();
        assert!(reg.public_key().is_none());
        assert!(reg.install_group_key(0, vec![8; 32]).is_err());
        reg.install_group_key(1, vec![8; 32]).unwrap();
        assert_eq!(reg.signer_set().group_key.unwrap().public_key, vec![8; 32]);
    }
}
