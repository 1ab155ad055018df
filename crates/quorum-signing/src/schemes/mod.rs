//! Threshold scheme combiners
//!
//! Each scheme turns additive partial signatures into one final signature.
//! Every share carries a 32-byte component that all contributors must agree
//! on (the group commitment, `r`, or the challenge seed) followed by the
//! signer's additive response. Combination checks that common prefix, parses
//! each response and sums them in the scheme's ring.
//!
//! Every supplied share is combined: additive shares only reconstruct the
//! signature when summed over the full contributing set.

pub mod cggmp21;
pub mod frost;
pub mod ringtail;

use async_trait::async_trait;
use quorum_core::{CombineError, Combiner, NodeId, ThresholdScheme};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use ringtail::{RINGTAIL_DEGREE, RINGTAIL_MODULUS};

/// Width of the common prefix every scheme's share starts with
pub const COMMITMENT_LEN: usize = 32;

/// `Combiner` dispatching on a `ThresholdScheme`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeCombiner {
    scheme: ThresholdScheme,
}

impl SchemeCombiner {
    /// Combiner for `scheme`
    pub fn new(scheme: ThresholdScheme) -> Self {
        Self { scheme }
    }

    /// Scheme this combiner handles
    pub fn scheme(&self) -> ThresholdScheme {
        self.scheme
    }

    /// Synchronous combination; the async trait method delegates here.
    pub fn combine_shares(
        &self,
        partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
        threshold: u32,
        total_signers: u32,
    ) -> Result<Vec<u8>, CombineError> {
        check_quorum(partial_signatures, threshold, total_signers)?;
        match self.scheme {
            ThresholdScheme::Frost => frost::combine(partial_signatures),
            ThresholdScheme::Cggmp21 => cggmp21::combine(partial_signatures),
            ThresholdScheme::Ringtail => ringtail::combine(partial_signatures),
        }
    }
}

#[async_trait]
impl Combiner for SchemeCombiner {
    fn scheme_name(&self) -> &'static str {
        self.scheme.as_str()
    }

    async fn combine(
        &self,
        partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
        threshold: u32,
        total_signers: u32,
    ) -> Result<Vec<u8>, CombineError> {
        self.combine_shares(partial_signatures, threshold, total_signers)
    }
}

/// Shared combiner for a configured scheme
pub fn combiner_for(scheme: ThresholdScheme) -> Arc<dyn Combiner> {
    Arc::new(SchemeCombiner::new(scheme))
}

/// Reject a zero threshold, a threshold above the signer count, or too few
/// shares.
pub fn check_quorum(
    partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
    threshold: u32,
    total_signers: u32,
) -> Result<(), CombineError> {
    if threshold == 0 || threshold > total_signers {
        return Err(CombineError::InvalidThreshold {
            threshold,
            total_signers,
        });
    }
    let need = threshold as usize;
    if partial_signatures.len() < need {
        return Err(CombineError::InsufficientShares {
            have: partial_signatures.len(),
            need,
        });
    }
    Ok(())
}

/// Split every share into its common prefix and response, checking the
/// length and that all prefixes agree.
pub(crate) fn split_shares<'a>(
    partial_signatures: &'a BTreeMap<NodeId, Vec<u8>>,
    response_len: usize,
    prefix_name: &str,
) -> Result<([u8; COMMITMENT_LEN], Vec<(&'a NodeId, &'a [u8])>), CombineError> {
    let expected = COMMITMENT_LEN + response_len;
    let mut common: Option<[u8; COMMITMENT_LEN]> = None;
    let mut responses = Vec::with_capacity(partial_signatures.len());

    for (node_id, share) in partial_signatures {
        if share.len() != expected {
            return Err(CombineError::MalformedShare {
                node_id: *node_id,
                reason: format!("expected {expected} bytes, got {}", share.len()),
            });
        }
        let (prefix, response) = share.split_at(COMMITMENT_LEN);
        let mut bytes = [0u8; COMMITMENT_LEN];
        bytes.copy_from_slice(prefix);

        match common {
            None => common = Some(bytes),
            Some(first) if first != bytes => {
                return Err(CombineError::InconsistentShares {
                    reason: format!("{node_id} disagrees on {prefix_name}"),
                });
            }
            Some(_) => {}
        }
        responses.push((node_id, response));
    }

    let common = common.ok_or(CombineError::InsufficientShares { have: 0, need: 1 })?;
    Ok((common, responses))
}

/// Copy a 32-byte slice into an array
pub(crate) fn array32(bytes: &[u8]) -> Option<[u8; 32]> {
    bytes.try_into().ok()
}
