//! Simulated signing rounds
//!
//! A `SigningRound` plays every party of one additive threshold signing for
//! a message hash and keeps enough of the group state to verify the combined
//! signature afterwards. FROST and CGGMP21 rounds verify with the real
//! Ed25519 and ECDSA verifiers.

use crate::fixtures::{
    cggmp21_share, derive_bytes, frost_share, ringtail_share, scalar25519, scalar_k256,
};
use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::Scalar;
use ed25519_dalek::Verifier;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use quorum_core::{Hash32, NodeId, ThresholdScheme};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;

/// Coefficients per Ringtail response; matches the combiner's ring
pub const RINGTAIL_DEGREE: usize = 256;
/// Ringtail coefficient modulus; matches the combiner's ring
pub const RINGTAIL_MODULUS: u64 = 0x1000000004A01;

/// One simulated signing round
#[derive(Debug, Clone)]
pub struct SigningRound {
    /// Scheme the shares belong to
    pub scheme: ThresholdScheme,
    /// Digest every share signs
    pub message_hash: Hash32,
    /// One share per party, in party order
    pub shares: Vec<Vec<u8>>,
    /// Group verification key (Ed25519 bytes or SEC1 compressed), if the
    /// scheme has one
    pub public_key: Option<Vec<u8>>,
    expected: Option<Vec<u8>>,
}

impl SigningRound {
    /// Run a round for `scheme` among `parties` signers (at least one)
    pub fn new(scheme: ThresholdScheme, parties: usize, message_hash: &Hash32) -> Self {
        match scheme {
            ThresholdScheme::Frost => Self::frost(parties, message_hash),
            ThresholdScheme::Cggmp21 => Self::cggmp21(parties, message_hash),
            ThresholdScheme::Ringtail => Self::ringtail(parties, message_hash),
        }
    }

    /// FROST: `z_i = k_i + c * x_i` with `c = H(R || A || m)`
    pub fn frost(parties: usize, message_hash: &Hash32) -> Self {
        let msg = message_hash.as_bytes();
        let secrets: Vec<Scalar> = (0..parties)
            .map(|i| scalar25519(&party_label(b"frost-x", i, &[])))
            .collect();
        let nonces: Vec<Scalar> = (0..parties)
            .map(|i| scalar25519(&party_label(b"frost-k", i, msg)))
            .collect();

        let a = (ED25519_BASEPOINT_POINT * secrets.iter().sum::<Scalar>())
            .compress()
            .to_bytes();
        let r = (ED25519_BASEPOINT_POINT * nonces.iter().sum::<Scalar>())
            .compress()
            .to_bytes();

        let mut hasher = Sha512::new();
        hasher.update(r);
        hasher.update(a);
        hasher.update(msg);
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hasher.finalize());
        let c = Scalar::from_bytes_mod_order_wide(&wide);

        let shares = secrets
            .iter()
            .zip(&nonces)
            .map(|(x, k)| frost_share(r, k + c * x))
            .collect();

        Self {
            scheme: ThresholdScheme::Frost,
            message_hash: *message_hash,
            shares,
            public_key: Some(a.to_vec()),
            expected: None,
        }
    }

    /// CGGMP21: additive shares of `s = k^-1 (m + r x)`
    pub fn cggmp21(parties: usize, message_hash: &Hash32) -> Self {
        let msg = message_hash.as_bytes();
        let x = scalar_k256(b"ecdsa-x");
        let k = scalar_k256(&party_label(b"ecdsa-k", 0, msg));

        let big_r = (k256::ProjectivePoint::GENERATOR * k).to_affine();
        let r = <k256::Scalar as Reduce<k256::U256>>::reduce_bytes(&big_r.x());
        let m = <k256::Scalar as Reduce<k256::U256>>::reduce_bytes(&k256::FieldBytes::from(
            *msg,
        ));
        let s = k.invert().unwrap() * (m + r * x);

        let mut shares = Vec::with_capacity(parties);
        let mut rest = s;
        for i in 1..parties {
            let sigma = scalar_k256(&party_label(b"ecdsa-sigma", i, msg));
            rest -= sigma;
            shares.push(cggmp21_share(r, sigma));
        }
        shares.push(cggmp21_share(r, rest));

        let public = (k256::ProjectivePoint::GENERATOR * x).to_affine();
        let key = k256::ecdsa::VerifyingKey::from_affine(public).unwrap();
        Self {
            scheme: ThresholdScheme::Cggmp21,
            message_hash: *message_hash,
            shares,
            public_key: Some(key.to_encoded_point(true).as_bytes().to_vec()),
            expected: None,
        }
    }

    /// Ringtail: pseudo-random reduced responses under a common seed
    pub fn ringtail(parties: usize, message_hash: &Hash32) -> Self {
        let msg = message_hash.as_bytes();
        let seed = derive_bytes(&[b"ringtail-seed".as_slice(), msg.as_slice()]);

        let mut sum = vec![0u64; RINGTAIL_DEGREE];
        let mut shares = Vec::with_capacity(parties);
        for i in 0..parties {
            let coeffs: Vec<u64> = (0..RINGTAIL_DEGREE)
                .map(|j| {
                    let label = party_label(b"ringtail-z", i, msg);
                    let h = derive_bytes(&[label.as_slice(), j.to_le_bytes().as_slice()]);
                    let mut word = [0u8; 8];
                    word.copy_from_slice(&h[..8]);
                    u64::from_le_bytes(word) % RINGTAIL_MODULUS
                })
                .collect();
            for (acc, c) in sum.iter_mut().zip(&coeffs) {
                *acc = (*acc + c) % RINGTAIL_MODULUS;
            }
            shares.push(ringtail_share(seed, &coeffs));
        }

        Self {
            scheme: ThresholdScheme::Ringtail,
            message_hash: *message_hash,
            shares,
            public_key: None,
            expected: Some(ringtail_share(seed, &sum)),
        }
    }

    /// Pair shares with signers in order
    pub fn assign(&self, signers: &[NodeId]) -> BTreeMap<NodeId, Vec<u8>> {
        signers.iter().copied().zip(self.shares.iter().cloned()).collect()
    }

    /// Check a combined signature against the round's group state
    pub fn verify(&self, signature: &[u8]) -> bool {
        let msg = self.message_hash.as_bytes();
        match self.scheme {
            ThresholdScheme::Frost => {
                let pk = self.public_key.as_deref();
                let Some(pk) = pk.and_then(|pk| <[u8; 32]>::try_from(pk).ok()) else {
                    return false;
                };
                let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&pk) else {
                    return false;
                };
                let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(msg, &sig).is_ok()
            }
            ThresholdScheme::Cggmp21 => {
                let Some(pk) = self.public_key.as_deref() else {
                    return false;
                };
                let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(pk) else {
                    return false;
                };
                let Ok(sig) = k256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify_prehash(msg, &sig).is_ok()
            }
            ThresholdScheme::Ringtail => self.expected.as_deref() == Some(signature),
        }
    }
}

fn party_label(tag: &[u8], party: usize, msg: &[u8]) -> Vec<u8> {
    let mut label = tag.to_vec();
    label.extend_from_slice(&(party as u64).to_le_bytes());
    label.extend_from_slice(msg);
    label
}
