//! End-to-end signing scenarios through `SigningService`

use quorum_core::{
    BondAmount, CallbackRequest, ErrorKind, Hash32, NodeId, QuorumConfig, QuorumError,
    ThresholdScheme,
};
use quorum_signing::{combiner_for, SessionStatus, SignerStatus, SigningService};
use quorum_testkit::{
    node_id, test_address, ChannelTransport, ConcatCombiner, ControllableClock,
    RecordingCallbacks, RecordingTransport, SigningRound,
};
use std::sync::Arc;
use std::time::Duration;

const MIN_BOND: BondAmount = 1_000;

fn config() -> QuorumConfig {
    QuorumConfig {
        max_signers: 5,
        min_signer_bond: MIN_BOND,
        max_pending_signs: 8,
        sign_timeout_ms: 60_000,
        sweep_interval_ms: 10,
        session_retention_ms: 60_000,
        ..QuorumConfig::default()
    }
}

async fn register(service: &SigningService, ids: impl IntoIterator<Item = u8>) {
    for i in ids {
        service
            .register_signer(node_id(i), test_address(i), vec![i; 32], MIN_BOND)
            .await
            .unwrap();
    }
}

async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn five_signers_complete_on_fourth_share() {
    for scheme in [
        ThresholdScheme::Frost,
        ThresholdScheme::Cggmp21,
        ThresholdScheme::Ringtail,
    ] {
        let clock = Arc::new(ControllableClock::new(1_000_000));
        let (transport, mut requests) = ChannelTransport::new();
        let callbacks = Arc::new(RecordingCallbacks::new());
        let service = SigningService::start(
            QuorumConfig { scheme, ..config() },
            combiner_for(scheme),
            Arc::new(transport),
            callbacks.clone(),
            clock.clone(),
        )
        .unwrap();

        register(&service, 1..=5).await;
        assert_eq!(service.get_signer_set().threshold, 4);

        let message_hash = Hash32::digest(b"withdraw 5 ETH");
        let callback = CallbackRequest {
            target: test_address(77),
            payload: b"nonce-1".to_vec(),
        };
        let session_id = service
            .request_signature(test_address(100), message_hash, Some(callback))
            .await
            .unwrap();

        let task = tokio::time::timeout(Duration::from_secs(1), requests.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.session_id, session_id);
        assert_eq!(task.eligible_signers.len(), 5);

        let quorum: Vec<NodeId> = task.eligible_signers[..4].to_vec();
        let round = SigningRound::new(scheme, quorum.len(), &task.message_hash);
        let shares = round.assign(&quorum);

        for node in &quorum[..3] {
            let status = service
                .submit_partial_signature(&session_id, *node, shares[node].clone())
                .await
                .unwrap();
            assert_eq!(status, SessionStatus::InProgress);
        }
        assert!(service.get_signature(&session_id).unwrap().signature.is_none());

        let status = service
            .submit_partial_signature(&session_id, quorum[3], shares[&quorum[3]].clone())
            .await
            .unwrap();
        assert_eq!(status, SessionStatus::Complete, "{scheme}");

        let view = service.get_signature(&session_id).unwrap();
        let signature = view.signature.unwrap();
        assert!(round.verify(&signature), "{scheme} signature must verify");

        eventually(|| callbacks.delivered().len() == 1).await;
        let delivered = &callbacks.delivered()[0];
        assert_eq!(delivered.target, test_address(77));
        assert_eq!(delivered.signature, signature);

        for i in 1..=4 {
            assert_eq!(service.get_signer(&node_id(i)).unwrap().sign_count, 1);
        }
        assert_eq!(service.get_signer(&node_id(5)).unwrap().sign_count, 0);

        service.shutdown().await;
    }
}

#[tokio::test]
async fn full_slash_at_minimum_bond_promotes_waitlist() {
    let clock = Arc::new(ControllableClock::new(0));
    let service = SigningService::start(
        config(),
        Arc::new(ConcatCombiner),
        Arc::new(RecordingTransport::new()),
        Arc::new(RecordingCallbacks::new()),
        clock.clone(),
    )
    .unwrap();

    register(&service, 1..=6).await;
    assert_eq!(
        service.get_signer(&node_id(6)).unwrap().status,
        SignerStatus::Waitlisted
    );
    service.install_group_key(0, vec![1; 32]).unwrap();

    clock.set_ms(500);
    let outcome = service.slash_signer(&node_id(3), 10_000).await.unwrap();
    assert_eq!(outcome.remaining_bond, 0);
    assert!(outcome.removed);

    let view = service.get_signer_set();
    assert_eq!(view.epoch, 1);
    assert_eq!(view.last_reshare_ms, Some(500));
    assert!(view.waitlist.is_empty());
    assert_eq!(view.active.len(), 5);
    assert_eq!(view.active.last().unwrap().node_id, node_id(6));
    assert!(service.get_public_key().is_none());
    assert_eq!(
        service.get_signer(&node_id(3)).unwrap().status,
        SignerStatus::Slashed
    );

    service.shutdown().await;
}

#[tokio::test]
async fn admission_control_rejects_without_creating_session() {
    let clock = Arc::new(ControllableClock::new(0));
    let service = SigningService::start(
        QuorumConfig {
            max_pending_signs: 1000,
            ..config()
        },
        Arc::new(ConcatCombiner),
        Arc::new(RecordingTransport::new()),
        Arc::new(RecordingCallbacks::new()),
        clock,
    )
    .unwrap();
    register(&service, 1..=3).await;

    for i in 0..1000u32 {
        service
            .request_signature(test_address(1), Hash32::digest(&i.to_le_bytes()), None)
            .await
            .unwrap();
    }
    let err = service
        .request_signature(test_address(1), Hash32::digest(b"one too many"), None)
        .await
        .unwrap_err();
    assert_eq!(err, QuorumError::TooManyPending { limit: 1000 });
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(service.session_stats().pending, 1000);

    service.shutdown().await;
}

#[tokio::test]
async fn terminal_sessions_reject_input_without_mutation() {
    let clock = Arc::new(ControllableClock::new(0));
    // Keep the background sweep out of the way so the late submission
    // observes the deadline itself
    let service = SigningService::start(
        QuorumConfig {
            sweep_interval_ms: 3_600_000,
            session_retention_ms: 3_600_000,
            ..config()
        },
        Arc::new(ConcatCombiner),
        Arc::new(RecordingTransport::new()),
        Arc::new(RecordingCallbacks::new()),
        clock.clone(),
    )
    .unwrap();
    register(&service, [1]).await;

    let done = service
        .request_signature(test_address(1), Hash32::digest(b"a"), None)
        .await
        .unwrap();
    service
        .submit_partial_signature(&done, node_id(1), vec![0xaa])
        .await
        .unwrap();

    let err = service
        .submit_partial_signature(&done, node_id(1), vec![0xbb])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(
        service.get_signature(&done).unwrap().signature,
        Some(vec![0xaa])
    );

    let stale = service
        .request_signature(test_address(1), Hash32::digest(b"b"), None)
        .await
        .unwrap();
    clock.set_ms(config().sign_timeout_ms + 1);
    let err = service
        .submit_partial_signature(&stale, node_id(1), vec![1])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expiry);

    let err = service
        .submit_partial_signature(&stale, node_id(1), vec![1])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let view = service.get_signature(&stale).unwrap();
    assert_eq!(view.status, SessionStatus::Expired);
    assert!(view.signature.is_none());

    service.shutdown().await;
}

#[tokio::test]
async fn background_sweeper_expires_sessions() {
    let clock = Arc::new(ControllableClock::new(0));
    let service = SigningService::start(
        config(),
        Arc::new(ConcatCombiner),
        Arc::new(RecordingTransport::new()),
        Arc::new(RecordingCallbacks::new()),
        clock.clone(),
    )
    .unwrap();
    register(&service, 1..=3).await;

    let session_id = service
        .request_signature(test_address(1), Hash32::digest(b"m"), None)
        .await
        .unwrap();
    clock.set_ms(config().sign_timeout_ms + 1);

    eventually(|| {
        service.get_signature(&session_id).unwrap().status == SessionStatus::Expired
    })
    .await;
    assert_eq!(service.session_stats().expired, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected_at_start() {
    let result = SigningService::start(
        QuorumConfig {
            max_pending_signs: 0,
            ..config()
        },
        Arc::new(ConcatCombiner),
        Arc::new(RecordingTransport::new()),
        Arc::new(RecordingCallbacks::new()),
        Arc::new(ControllableClock::new(0)),
    );
    assert!(matches!(result, Err(QuorumError::Invalid { .. })));
}

#[tokio::test]
async fn share_from_removed_signer_stays_counted() {
    let clock = Arc::new(ControllableClock::new(0));
    let service = SigningService::start(
        QuorumConfig {
            sweep_interval_ms: 60_000,
            ..config()
        },
        Arc::new(ConcatCombiner),
        Arc::new(RecordingTransport::new()),
        Arc::new(RecordingCallbacks::new()),
        clock,
    )
    .unwrap();
    register(&service, 1..=5).await;
    let id = service
        .request_signature(test_address(9), Hash32::digest(b"m"), None)
        .await
        .unwrap();

    let status = service
        .submit_partial_signature(&id, node_id(5), vec![5])
        .await
        .unwrap();
    assert_eq!(status, SessionStatus::InProgress);

    service.remove_signer(&node_id(5)).await.unwrap();
    assert_eq!(service.registry().threshold(), 3);

    let err = service
        .submit_partial_signature(&id, node_id(5), vec![55])
        .await
        .unwrap_err();
    assert_eq!(err, QuorumError::UnauthorizedSigner { node_id: node_id(5) });

    for i in 1..=2 {
        service
            .submit_partial_signature(&id, node_id(i), vec![i])
            .await
            .unwrap();
    }

    let view = service.get_signature(&id).unwrap();
    assert_eq!(view.status, SessionStatus::Complete);
    assert_eq!(view.shares_collected, 3);
    assert_eq!(view.signature, Some(vec![1, 2, 5]));

    service.shutdown().await;
}
