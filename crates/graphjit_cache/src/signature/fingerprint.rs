//! Deterministic 64-bit fingerprints for on-disk cache keys.
//!
//! The in-memory map hashes with `ahash`, whose output is only meaningful inside one
//! process. Keys written to disk must come out the same in the next process, so they
//! are derived from a SHA-1 digest instead.

use sha1::{Digest, Sha1};
use std::hash::{Hash, Hasher};

/// `Hasher` that feeds everything into SHA-1 and reports the first 8 digest bytes
#[derive(Clone, Default)]
pub struct StableHasher {
    digest: Sha1,
}

impl StableHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Hasher for StableHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.digest.clone().finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }
}

/// Fingerprint any `Hash` value through its `Hash` impl
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = StableHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Fingerprint raw bytes, e.g. a serialized lowered program
pub fn fingerprint_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = StableHasher::new();
    hasher.write(bytes);
    hasher.finish()
}
