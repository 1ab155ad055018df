//! FROST over Ed25519
//!
//! Share: `R (32 B compressed Edwards point) || z_i (32 B canonical scalar)`.
//! Signature: `R || sum(z_i)`, a standard 64-byte Ed25519 signature.

use super::{array32, split_shares};
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::scalar::Scalar;
use quorum_core::{CombineError, NodeId};
use std::collections::BTreeMap;

/// Encoded Ed25519 signature length
pub const SIGNATURE_LEN: usize = 64;

pub(crate) fn combine(
    partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
) -> Result<Vec<u8>, CombineError> {
    let (commitment, responses) = split_shares(partial_signatures, 32, "group commitment R")?;

    if CompressedEdwardsY(commitment).decompress().is_none() {
        return Err(CombineError::Scheme(
            "group commitment R is not a valid Edwards point".to_string(),
        ));
    }

    let mut z = Scalar::ZERO;
    for (node_id, response) in responses {
        z += parse_response(node_id, response)?;
    }

    let mut signature = Vec::with_capacity(SIGNATURE_LEN);
    signature.extend_from_slice(&commitment);
    signature.extend_from_slice(z.as_bytes());
    Ok(signature)
}

fn parse_response(node_id: &NodeId, bytes: &[u8]) -> Result<Scalar, CombineError> {
    let malformed = |reason: &str| CombineError::MalformedShare {
        node_id: *node_id,
        reason: reason.to_string(),
    };
    let bytes = array32(bytes).ok_or_else(|| malformed("response is not 32 bytes"))?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| malformed("response is not a canonical scalar"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
    use quorum_core::Hash32;
    use quorum_testkit::{frost_share, node_id, SigningRound};

    fn signers(n: u8) -> Vec<NodeId> {
        (1..=n).map(node_id).collect()
    }

    #[test]
    fn test_combined_signature_verifies() {
        let round = SigningRound::frost(4, &Hash32::digest(b"bridge withdrawal #17"));
        let signature = combine(&round.assign(&signers(4))).unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(round.verify(&signature));
    }

    #[test]
    fn test_missing_share_breaks_signature() {
        let round = SigningRound::frost(3, &Hash32::digest(b"m"));
        let mut shares = round.assign(&signers(3));
        shares.remove(&node_id(1));

        let signature = combine(&shares).unwrap();
        assert!(!round.verify(&signature));
    }

    #[test]
    fn test_non_canonical_response_rejected() {
        let r = ED25519_BASEPOINT_POINT.compress().to_bytes();
        let mut share = r.to_vec();
        share.extend_from_slice(&[0xff; 32]);
        let shares: BTreeMap<_, _> = [(node_id(1), share)].into();
        assert!(matches!(
            combine(&shares),
            Err(CombineError::MalformedShare { .. })
        ));
    }

    #[test]
    fn test_invalid_commitment_rejected() {
        // y = 2 is not on the curve
        let mut r = [0u8; 32];
        r[0] = 2;
        let shares: BTreeMap<_, _> = [(node_id(1), frost_share(r, Scalar::ONE))].into();
        assert!(matches!(combine(&shares), Err(CombineError::Scheme(_))));
    }
}
