//! Content hashing for identifiers
//!
//! Single place where the digest algorithm is chosen. Everything that needs a
//! collision-resistant digest (session ids, domain-separated commitments) goes
//! through `hash()` or `hasher()` so the algorithm can be swapped in one spot.
//!
//! Current algorithm: **SHA-256** (32-byte output)

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes to a 32-byte digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut h = hasher();
    h.update(data);
    h.finalize()
}

/// Create an incremental hasher for multi-part input.
pub fn hasher() -> IncrementalHasher {
    IncrementalHasher {
        inner: Sha256::new(),
    }
}

/// Incremental hasher over the workspace digest algorithm.
#[derive(Clone, Default)]
pub struct IncrementalHasher {
    inner: Sha256,
}

impl IncrementalHasher {
    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}
