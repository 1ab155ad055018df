//! Property tests for quorum arithmetic, registry invariants and sweeping

use proptest::prelude::*;
use quorum_core::{Hash32, QuorumConfig};
use quorum_signing::{threshold_for, SessionManager, SessionStatus, SignerRegistry};
use quorum_testkit::{node_id, test_address, ConcatCombiner, ControllableClock};
use std::collections::BTreeSet;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[derive(Debug, Clone)]
enum RegistryOp {
    Register(u8),
    Remove(u8),
    Slash(u8, u32),
}

fn registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        3 => (1u8..12).prop_map(RegistryOp::Register),
        1 => (1u8..12).prop_map(RegistryOp::Remove),
        1 => ((1u8..12), 0u32..12_000).prop_map(|(n, bps)| RegistryOp::Slash(n, bps)),
    ]
}

fn manager(
    rt: &tokio::runtime::Runtime,
    signers: u8,
    clock: Arc<ControllableClock>,
) -> SessionManager {
    rt.block_on(async {
        let config = QuorumConfig {
            min_signer_bond: 1,
            sign_timeout_ms: 100,
            ..QuorumConfig::default()
        };
        let registry = Arc::new(SignerRegistry::new(&config, clock.clone()));
        for i in 1..=signers {
            registry
                .register_signer(node_id(i), test_address(i), vec![i], 1)
                .await
                .unwrap();
        }
        SessionManager::new(&config, registry, Arc::new(ConcatCombiner), clock).0
    })
}

proptest! {
    #[test]
    fn threshold_is_a_two_thirds_quorum(n in 1usize..5_000) {
        let t = threshold_for(n) as usize;
        prop_assert!(t >= 1);
        prop_assert!(t <= n);
        prop_assert!(3 * t > 2 * n);
        prop_assert_eq!(t, 2 * n / 3 + 1);
    }

    #[test]
    fn registry_invariants_hold(
        max_signers in 1usize..6,
        ops in prop::collection::vec(registry_op(), 1..40),
    ) {
        let clock = Arc::new(ControllableClock::new(0));
        let config = QuorumConfig {
            max_signers,
            min_signer_bond: 100,
            ..QuorumConfig::default()
        };
        let registry = SignerRegistry::new(&config, clock.clone());
        let rt = runtime();
        let mut last_epoch = 0;

        for op in ops {
            clock.advance_ms(1);
            rt.block_on(async {
                let _ = match op {
                    RegistryOp::Register(n) => registry
                        .register_signer(node_id(n), test_address(n), vec![n], 150)
                        .await
                        .map(|_| ()),
                    RegistryOp::Remove(n) => registry.remove_signer(&node_id(n)).await,
                    RegistryOp::Slash(n, bps) => {
                        registry.slash_signer(&node_id(n), bps).await.map(|_| ())
                    }
                };
            });

            let view = registry.signer_set();
            prop_assert!(view.active.len() <= max_signers);
            prop_assert_eq!(view.threshold, threshold_for(view.active.len()));
            prop_assert!(view.epoch >= last_epoch);
            last_epoch = view.epoch;

            let mut seen = BTreeSet::new();
            for id in view.active.iter().map(|s| s.node_id).chain(view.waitlist.iter().copied()) {
                prop_assert!(seen.insert(id), "duplicate member {}", id);
            }
            // A waitlist only exists while the active set is full
            prop_assert!(view.waitlist.is_empty() || view.active.len() == max_signers);
        }
    }

    #[test]
    fn session_completes_exactly_at_quorum(
        signers in 1u8..8,
        submissions in prop::collection::vec(1u8..8, 1..20),
    ) {
        let clock = Arc::new(ControllableClock::new(0));
        let rt = runtime();
        let manager = manager(&rt, signers, clock);
        let threshold = threshold_for(signers as usize) as usize;
        let id = rt
            .block_on(manager.request_signature(test_address(1), Hash32::digest(b"m"), None))
            .unwrap();

        let mut distinct = BTreeSet::new();
        for node in submissions.into_iter().filter(|n| *n <= signers) {
            let was_complete = distinct.len() >= threshold;
            let result =
                rt.block_on(manager.submit_partial_signature(&id, node_id(node), vec![node]));
            if was_complete {
                prop_assert!(result.is_err());
                continue;
            }
            distinct.insert(node);
            let status = manager.get_signature(&id).unwrap().status;
            if distinct.len() >= threshold {
                prop_assert_eq!(status, SessionStatus::Complete);
            } else {
                prop_assert_eq!(status, SessionStatus::InProgress);
            }
        }
    }

    #[test]
    fn expiry_sweep_is_idempotent(
        created in prop::collection::vec((0u64..500, any::<bool>()), 1..20),
        now in 0u64..800,
    ) {
        let clock = Arc::new(ControllableClock::new(0));
        let rt = runtime();
        let manager = manager(&rt, 3, clock.clone());

        let mut ids = Vec::new();
        for (i, (at, touched)) in created.into_iter().enumerate() {
            clock.set_ms(at);
            let id = rt.block_on(manager.request_signature(
                test_address(1),
                Hash32::digest(&(i as u64).to_le_bytes()),
                None,
            ))
            .unwrap();
            if touched {
                rt.block_on(manager.submit_partial_signature(&id, node_id(1), vec![1]))
                    .unwrap();
            }
            ids.push(id);
        }

        let snapshot = |m: &SessionManager| {
            ids.iter().map(|id| m.get_signature(id).unwrap()).collect::<Vec<_>>()
        };

        manager.expiry_sweep(now);
        let once = snapshot(&manager);
        prop_assert_eq!(manager.expiry_sweep(now), 0);
        prop_assert_eq!(snapshot(&manager), once.clone());

        for view in &once {
            let overdue = view.expires_at_ms < now;
            prop_assert_eq!(view.status == SessionStatus::Expired, overdue);
        }
    }
}
