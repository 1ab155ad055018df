//! Ringtail lattice threshold signatures
//!
//! Share: `seed (32 B) || z_i`, where `z_i` is a response polynomial of
//! `RINGTAIL_DEGREE` little-endian u64 coefficients, each reduced modulo
//! `RINGTAIL_MODULUS`. The seed fixes the challenge and must match across
//! shares. Signature: `seed || sum(z_i)` with coefficient-wise modular sums.

use super::split_shares;
use quorum_core::{CombineError, NodeId};
use std::collections::BTreeMap;

/// Coefficients per response polynomial
pub const RINGTAIL_DEGREE: usize = 256;

/// Prime modulus of the coefficient ring
pub const RINGTAIL_MODULUS: u64 = 0x1000000004A01;

const COEFF_LEN: usize = 8;
const RESPONSE_LEN: usize = RINGTAIL_DEGREE * COEFF_LEN;

/// Encoded share and signature length
pub const SHARE_LEN: usize = 32 + RESPONSE_LEN;

pub(crate) fn combine(
    partial_signatures: &BTreeMap<NodeId, Vec<u8>>,
) -> Result<Vec<u8>, CombineError> {
    let (seed, responses) = split_shares(partial_signatures, RESPONSE_LEN, "challenge seed")?;

    let mut acc = vec![0u64; RINGTAIL_DEGREE];
    for (node_id, response) in responses {
        for (i, chunk) in response.chunks_exact(COEFF_LEN).enumerate() {
            let mut word = [0u8; COEFF_LEN];
            word.copy_from_slice(chunk);
            let coeff = u64::from_le_bytes(word);
            if coeff >= RINGTAIL_MODULUS {
                return Err(CombineError::MalformedShare {
                    node_id: *node_id,
                    reason: format!("coefficient {i} not reduced modulo q"),
                });
            }
            // Both operands are below 2^49, so the sum cannot overflow
            acc[i] = (acc[i] + coeff) % RINGTAIL_MODULUS;
        }
    }

    let mut signature = Vec::with_capacity(SHARE_LEN);
    signature.extend_from_slice(&seed);
    for coeff in acc {
        signature.extend_from_slice(&coeff.to_le_bytes());
    }
    Ok(signature)
}
