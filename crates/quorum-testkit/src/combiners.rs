//! Combiners with controllable behaviour

use async_trait::async_trait;
use quorum_core::{CombineError, Combiner, NodeId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

fn concat(partial_signatures: &BTreeMap<NodeId, Vec<u8>>) -> Vec<u8> {
    partial_signatures.values().flatten().copied().collect()
}

/// Concatenates shares in `NodeId` order. Only for exercising session flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatCombiner;

#[async_trait]
impl Combiner for ConcatCombiner {
    fn scheme_name(&self) -> &'static str {
        "concat"
    }

    async fn combine(
        &self,
        partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
        _threshold: u32,
        _total_signers: u32,
    ) -> Result<Vec<u8>, CombineError> {
        Ok(concat(partial_signatures))
    }
}

/// Fails every combination with `CombineError::Scheme(message)`
#[derive(Debug, Clone)]
pub struct FailingCombiner {
    message: String,
}

impl FailingCombiner {
    /// Combiner failing with `message`
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Combiner for FailingCombiner {
    fn scheme_name(&self) -> &'static str {
        "failing"
    }

    async fn combine(
        &self,
        _partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
        _threshold: u32,
        _total_signers: u32,
    ) -> Result<Vec<u8>, CombineError> {
        Err(CombineError::Scheme(self.message.clone()))
    }
}

/// Concatenating combiner that parks inside `combine` until released.
///
/// Lets a test interleave other operations (an expiry sweep, more
/// submissions) while a combine is in flight.
#[derive(Debug, Default)]
pub struct GatedCombiner {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
}

impl GatedCombiner {
    /// Combiner that parks until released
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a combine call has started
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked combine call finish
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Combine calls started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Combiner for GatedCombiner {
    fn scheme_name(&self) -> &'static str {
        "gated"
    }

    async fn combine(
        &self,
        partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
        _threshold: u32,
        _total_signers: u32,
    ) -> Result<Vec<u8>, CombineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(concat(partial_signatures))
    }
}
