//! Core identifier types used across the signing workspace
//!
//! Identifiers are fixed-size byte arrays with hex `Display`/`FromStr` so they
//! can travel through logs, config files and host adapters unchanged.

use crate::hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 32-byte digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    /// All-zero digest
    pub const ZERO: Self = Self([0u8; 32]);

    /// Digest of arbitrary bytes
    pub fn digest(data: &[u8]) -> Self {
        Self(hash::hash(data))
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Hash32 {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<32>(s).map(Self)
    }
}

/// Remote signer node identifier
///
/// Opaque and fixed-size. Sessions reference contributions by `NodeId` only,
/// never by pointer into the registry, so membership may change mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a stable node id from a label (tooling and simulations)
    pub fn from_label(label: &str) -> Self {
        let mut h = hash::hasher();
        h.update(b"QUORUM_NODE_ID");
        h.update(label.as_bytes());
        Self(h.finalize())
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty for log correlation
        write!(f, "node-{}", hex::encode(&self.0[..8]))
    }
}

impl FromStr for NodeId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<32>(s).map(Self)
    }
}

impl From<[u8; 32]> for NodeId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// 20-byte account address on the host chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainAddress(pub [u8; 20]);

impl ChainAddress {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ChainAddress {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        parse_fixed_hex::<20>(trimmed).map(Self)
    }
}

impl From<[u8; 20]> for ChainAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// Signing session identifier
///
/// Derived from `(message_hash, requester, requested_at_ms, nonce)` so that
/// re-requests of the same message never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Hash32);

impl SessionId {
    /// Derive the id for a new signing request.
    ///
    /// `nonce` is a per-manager counter; it separates requests that share the
    /// same message, requester and millisecond.
    pub fn derive(
        message_hash: &Hash32,
        requester: &ChainAddress,
        requested_at_ms: u64,
        nonce: u64,
    ) -> Self {
        let mut h = hash::hasher();
        h.update(b"QUORUM_SIGNING_SESSION");
        h.update(message_hash.as_bytes());
        h.update(requester.as_bytes());
        h.update(&requested_at_ms.to_be_bytes());
        h.update(&nonce.to_be_bytes());
        Self(Hash32(h.finalize()))
    }

    /// Underlying digest
    pub fn hash(&self) -> Hash32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", hex::encode(&self.0.as_bytes()[..8]))
    }
}

impl FromStr for SessionId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash32::from_str(s).map(Self)
    }
}

/// Failure to parse a hex identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierParseError {
    /// Not valid hex
    #[error("invalid hex: {0}")]
    Hex(String),
    /// Wrong decoded length
    #[error("expected {expected} bytes, got {actual}")]
    Length {
        /// Required byte length
        expected: usize,
        /// Decoded byte length
        actual: usize,
    },
}

fn parse_fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], IdentifierParseError> {
    let bytes = hex::decode(s).map_err(|e| IdentifierParseError::Hex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| IdentifierParseError::Length {
            expected: N,
            actual,
        })
}
