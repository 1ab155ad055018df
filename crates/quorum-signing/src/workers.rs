//! Transport and callback worker loops
//!
//! The session manager never awaits a remote party. It pushes task messages
//! onto bounded queues, and these loops drain them into the injected
//! `SignerTransport` and `CallbackEffects`. Delivery failures are logged and
//! never touch session state.
//!
//! Each loop ends when its queue closes or the shutdown flag changes. Tasks
//! already queued are drained first.

use quorum_core::{CallbackEffects, CallbackTask, SignerTransport, SigningTask};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Receiving ends of the manager's work queues
#[derive(Debug)]
pub struct WorkerQueues {
    /// Signing requests for the transport worker
    pub signing: mpsc::Receiver<SigningTask>,
    /// Completed signatures for the callback worker
    pub callbacks: mpsc::Receiver<CallbackTask>,
}

/// Next queued item, or `None` once the queue closes or shutdown is signalled
async fn next_task<T>(
    queue: &mut mpsc::Receiver<T>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<T> {
    tokio::select! {
        biased;
        task = queue.recv() => task,
        _ = shutdown.changed() => None,
    }
}

/// Forward signing tasks to the transport.
///
/// Returns the number of tasks handed to the transport.
pub async fn run_transport_worker(
    mut queue: mpsc::Receiver<SigningTask>,
    transport: Arc<dyn SignerTransport>,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut dispatched = 0;
    while let Some(task) = next_task(&mut queue, &mut shutdown).await {
        let session_id = task.session_id;
        match transport.dispatch(task).await {
            Ok(()) => {
                dispatched += 1;
                debug!(session_id = %session_id, "Signing task dispatched");
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "Signing task dispatch failed"),
        }
    }
    debug!(dispatched, "Transport worker stopped");
    dispatched
}

/// Deliver completion callbacks.
///
/// Delivery is at-most-once: a failed callback is logged and dropped.
pub async fn run_callback_worker(
    mut queue: mpsc::Receiver<CallbackTask>,
    callbacks: Arc<dyn CallbackEffects>,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut delivered = 0;
    while let Some(task) = next_task(&mut queue, &mut shutdown).await {
        let session_id = task.session_id;
        match callbacks.deliver(task).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(session_id = %session_id, error = %e, "Callback delivery failed"),
        }
    }
    debug!(delivered, "Callback worker stopped");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_core::{ChainAddress, Hash32, NodeId, SessionId};
    use quorum_testkit::{RecordingCallbacks, RecordingTransport};

    fn session(i: u64) -> SessionId {
        SessionId::derive(&Hash32::ZERO, &ChainAddress::from_bytes([0; 20]), 0, i)
    }

    #[tokio::test]
    async fn test_transport_worker_drains_queue() {
        let transport = Arc::new(RecordingTransport::new());
        let (tx, rx) = mpsc::channel(4);
        for i in 0..3 {
            tx.send(SigningTask {
                session_id: session(i),
                message_hash: Hash32::ZERO,
                eligible_signers: vec![NodeId::from_bytes([1; 32])],
                expires_at_ms: 10,
            })
            .await
            .unwrap();
        }
        drop(tx);

        let (_stop, stop_rx) = watch::channel(false);
        let dispatched = run_transport_worker(rx, transport.clone(), stop_rx).await;
        assert_eq!(dispatched, 3);
        assert_eq!(transport.tasks().len(), 3);
    }

    #[tokio::test]
    async fn test_callback_failures_are_dropped() {
        let callbacks = Arc::new(RecordingCallbacks::failing());
        let (tx, rx) = mpsc::channel(4);
        tx.send(CallbackTask {
            session_id: session(0),
            target: ChainAddress::from_bytes([1; 20]),
            payload: vec![],
            signature: vec![1],
        })
        .await
        .unwrap();
        drop(tx);

        let (_stop, stop_rx) = watch::channel(false);
        assert_eq!(run_callback_worker(rx, callbacks.clone(), stop_rx).await, 0);
        assert_eq!(callbacks.attempts(), 1);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown_with_open_queue() {
        let (_tx, rx) = mpsc::channel::<SigningTask>(4);
        let (stop, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_transport_worker(
            rx,
            Arc::new(RecordingTransport::new()),
            stop_rx,
        ));
        stop.send(true).unwrap();
        assert_eq!(worker.await.unwrap(), 0);
    }
}
