//! `quorum simulate`
//!
//! Runs a full service in-process: simulated signers register, one signing
//! session is requested, the first `threshold` eligible signers answer the
//! dispatched task, and the combined signature is checked against the
//! round's group key.

use anyhow::Context;
use quorum_core::{
    CallbackRequest, ChainAddress, Hash32, NodeId, QuorumConfig, SessionId, ThresholdScheme,
};
use quorum_effects::{RealTimeHandler, TracingCallbackHandler};
use quorum_signing::{combiner_for, SessionView, SignerSetView, SigningService};
use quorum_testkit::{derive_bytes, ChannelTransport, SigningRound};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one simulated session
#[derive(Debug)]
pub struct Simulation {
    pub session_id: SessionId,
    pub view: SessionView,
    pub verified: bool,
    pub signer_set: SignerSetView,
}

pub async fn run(
    signers: u8,
    scheme: Option<ThresholdScheme>,
    message: &str,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(scheme) = scheme {
        config.scheme = scheme;
    }

    let outcome = simulate(config, signers, message).await?;

    println!("session:   {}", outcome.session_id);
    println!("status:    {}", outcome.view.status);
    if let Some(signature) = &outcome.view.signature {
        println!("signature: {}", hex::encode(signature));
    }
    if let Some(failure) = &outcome.view.failure {
        println!("failure:   {failure}");
    }
    println!("verified:  {}", outcome.verified);
    println!("{}", serde_json::to_string_pretty(&outcome.signer_set)?);

    anyhow::ensure!(outcome.verified, "combined signature did not verify");
    Ok(())
}

fn signer_address(i: u8) -> ChainAddress {
    let digest = derive_bytes(&[b"sim-address", &[i]]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    ChainAddress::from_bytes(bytes)
}

/// Run one session against `signers` simulated signers
pub async fn simulate(
    config: QuorumConfig,
    signers: u8,
    message: &str,
) -> anyhow::Result<Simulation> {
    anyhow::ensure!(signers > 0, "at least one signer is required");

    let scheme = config.scheme;
    let min_bond = config.min_signer_bond;
    let (transport, mut dispatched) = ChannelTransport::new();
    let service = SigningService::start(
        config,
        combiner_for(scheme),
        Arc::new(transport),
        Arc::new(TracingCallbackHandler),
        Arc::new(RealTimeHandler::new()),
    )?;

    for i in 0..signers {
        let node_id = NodeId::from_label(&format!("sim-signer-{i}"));
        let share = derive_bytes(&[b"sim-share", node_id.as_bytes()]).to_vec();
        let status = service
            .register_signer(node_id, signer_address(i), share, min_bond)
            .await?;
        debug!(node_id = %node_id, status = %status, "Simulated signer registered");
    }

    let registry = service.registry();
    let threshold = registry.threshold() as usize;
    let message_hash = Hash32::digest(message.as_bytes());
    let round = SigningRound::new(scheme, threshold, &message_hash);
    if let Some(public_key) = &round.public_key {
        service.install_group_key(registry.epoch(), public_key.clone())?;
    }
    info!(
        scheme = %scheme,
        active = registry.active_count(),
        threshold,
        "Simulated signer set ready"
    );

    let requester = signer_address(u8::MAX);
    let session_id = service
        .request_signature(
            requester,
            message_hash,
            Some(CallbackRequest {
                target: requester,
                payload: message.as_bytes().to_vec(),
            }),
        )
        .await?;

    let task = dispatched
        .recv()
        .await
        .context("transport closed before the signing task was dispatched")?;
    anyhow::ensure!(
        task.session_id == session_id,
        "dispatched task belongs to another session"
    );

    let quorum = &task.eligible_signers[..threshold.min(task.eligible_signers.len())];
    for (node_id, share) in round.assign(quorum) {
        let status = service
            .submit_partial_signature(&session_id, node_id, share)
            .await?;
        debug!(node_id = %node_id, status = %status, "Share submitted");
    }

    let view = service.get_signature(&session_id)?;
    let verified = view
        .signature
        .as_deref()
        .is_some_and(|signature| round.verify(signature));
    let signer_set = service.get_signer_set();
    service.shutdown().await;

    Ok(Simulation {
        session_id,
        view,
        verified,
        signer_set,
    })
}
