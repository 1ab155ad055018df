//! Identifier and share fixtures

use k256::elliptic_curve::ops::Reduce;
use quorum_core::{ChainAddress, NodeId};
use sha2::{Digest, Sha256};

/// Deterministic node id; ids order the same way as `i`
pub fn node_id(i: u8) -> NodeId {
    NodeId::from_bytes([i; 32])
}

/// Deterministic chain address
pub fn test_address(i: u8) -> ChainAddress {
    ChainAddress::from_bytes([i; 20])
}

/// `SHA-256(part_0 || part_1 || ...)`
pub fn derive_bytes(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Ed25519 scalar derived from a label
pub fn scalar25519(label: &[u8]) -> curve25519_dalek::Scalar {
    curve25519_dalek::Scalar::from_bytes_mod_order(derive_bytes(&[label]))
}

/// secp256k1 scalar derived from a label
pub fn scalar_k256(label: &[u8]) -> k256::Scalar {
    let bytes = k256::FieldBytes::from(derive_bytes(&[label]));
    <k256::Scalar as Reduce<k256::U256>>::reduce_bytes(&bytes)
}

/// FROST share `R || z`
pub fn frost_share(commitment: [u8; 32], z: curve25519_dalek::Scalar) -> Vec<u8> {
    let mut share = commitment.to_vec();
    share.extend_from_slice(z.as_bytes());
    share
}

/// CGGMP21 share `r || sigma`
pub fn cggmp21_share(r: k256::Scalar, sigma: k256::Scalar) -> Vec<u8> {
    let mut share = r.to_bytes().to_vec();
    share.extend_from_slice(&sigma.to_bytes());
    share
}

/// Ringtail share `seed || coefficients (u64 LE)`
pub fn ringtail_share(seed: [u8; 32], coefficients: &[u64]) -> Vec<u8> {
    let mut share = seed.to_vec();
    for c in coefficients {
        share.extend_from_slice(&c.to_le_bytes());
    }
    share
}
