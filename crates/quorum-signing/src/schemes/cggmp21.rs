//! CGGMP21 threshold ECDSA over secp256k1
//!
//! Share: `r (32 B) || sigma_i (32 B)`, both big-endian scalars. `r` is the
//! x-coordinate of the presignature point and must match across shares.
//! Signature: `r || s` with `s = sum(sigma_i)` normalized to low-s.

use super::{array32, split_shares};
use k256::elliptic_curve::scalar::IsHigh;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};
use quorum_core::{CombineError, NodeId};
use std::collections::BTreeMap;

/// Encoded `r || s` length
pub const SIGNATURE_LEN: usize = 64;

pub(crate) fn combine(
    partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
) -> Result<Vec<u8>, CombineError> {
    let (r_bytes, responses) = split_shares(partial_signatures, 32, "r")?;

    let r = parse_scalar(&r_bytes)
        .filter(|r| *r != Scalar::ZERO)
        .ok_or_else(|| CombineError::Scheme("r is zero or not a valid scalar".to_string()))?;

    let mut s = Scalar::ZERO;
    for (node_id, response) in responses {
        let sigma = array32(response)
            .and_then(|bytes| parse_scalar(&bytes))
            .ok_or_else(|| CombineError::MalformedShare {
                node_id: *node_id,
                reason: "sigma is not a valid secp256k1 scalar".to_string(),
            })?;
        s += sigma;
    }

    if s == Scalar::ZERO {
        return Err(CombineError::Scheme("combined s is zero".to_string()));
    }
    if bool::from(s.is_high()) {
        s = -s;
    }

    let mut signature = Vec::with_capacity(SIGNATURE_LEN);
    signature.extend_from_slice(&r.to_bytes());
    signature.extend_from_slice(&s.to_bytes());
    Ok(signature)
}

fn parse_scalar(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
}
