//! Recording transport and callback handlers

use async_trait::async_trait;
use parking_lot::Mutex;
use quorum_core::{
    CallbackEffects, CallbackError, CallbackTask, SignerTransport, SigningTask, TransportError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Transport that keeps every dispatched task
#[derive(Debug, Default)]
pub struct RecordingTransport {
    tasks: Mutex<Vec<SigningTask>>,
}

impl RecordingTransport {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks dispatched so far, in order
    pub fn tasks(&self) -> Vec<SigningTask> {
        self.tasks.lock().clone()
    }
}

#[async_trait]
impl SignerTransport for RecordingTransport {
    async fn dispatch(&self, task: SigningTask) -> Result<(), TransportError> {
        self.tasks.lock().push(task);
        Ok(())
    }
}

/// Transport that forwards tasks to an in-process channel, standing in for
/// a signer network.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<SigningTask>,
}

impl ChannelTransport {
    /// Transport plus the receiver for dispatched tasks
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SigningTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SignerTransport for ChannelTransport {
    async fn dispatch(&self, task: SigningTask) -> Result<(), TransportError> {
        self.tx
            .send(task)
            .map_err(|_| TransportError::Unreachable("signer network stopped".to_string()))
    }
}

/// Callback handler that records deliveries, or fails every one
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    delivered: Mutex<Vec<CallbackTask>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingCallbacks {
    /// Callbacks that always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that rejects every delivery
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Callbacks delivered so far
    pub fn delivered(&self) -> Vec<CallbackTask> {
        self.delivered.lock().clone()
    }

    /// Deliveries attempted, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallbackEffects for RecordingCallbacks {
    async fn deliver(&self, task: CallbackTask) -> Result<(), CallbackError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CallbackError::Failed {
                target: task.target,
                reason: "target reverted".to_string(),
            });
        }
        self.delivered.lock().push(task);
        Ok(())
    }
}
