//! # Wire Byte Digests
//!
//! SHA-256 digests over module wire bytes. Streaming validation folds chunks
//! into a [`DigestAccumulator`] as they arrive; record creation hashes the
//! complete wire bytes once with [`digest_once`]. The two never share state.

use std::fmt;

use sha2::{Digest, Sha256};

/// Size in bytes of every digest stored in a cache record.
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest of module wire bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireDigest([u8; DIGEST_SIZE]);

impl WireDigest {
    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Read a digest from the first [`DIGEST_SIZE`] bytes of `slice`.
    ///
    /// Returns `None` if the slice is shorter than a digest.
    pub fn from_prefix(slice: &[u8]) -> Option<Self> {
        let prefix = slice.get(..DIGEST_SIZE)?;
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes.copy_from_slice(prefix);
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for WireDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireDigest({})", self.to_hex())
    }
}

impl fmt::Display for WireDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash a complete buffer in one step
pub fn digest_once(bytes: &[u8]) -> WireDigest {
    let hash = Sha256::digest(bytes);
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&hash);
    WireDigest(out)
}

/// Running SHA-256 state over a byte stream.
///
/// [`finish`](Self::finish) spends the accumulator. Any use after that marks
/// it as failed, and a failed accumulator never yields a digest, so callers
/// treat it as a cache miss.
pub struct DigestAccumulator {
    hasher: Option<Sha256>,
    bytes_seen: u64,
    failed: bool,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self {
            hasher: Some(Sha256::new()),
            bytes_seen: 0,
            failed: false,
        }
    }

    /// Fold `bytes` into the running hash
    pub fn update(&mut self, bytes: &[u8]) {
        match self.hasher.as_mut() {
            Some(hasher) => {
                hasher.update(bytes);
                self.bytes_seen += bytes.len() as u64;
            }
            None => self.failed = true,
        }
    }

    /// Produce the digest of everything passed to [`update`](Self::update).
    ///
    /// Returns `None` if the accumulator has failed or was already finished.
    pub fn finish(&mut self) -> Option<WireDigest> {
        let Some(hasher) = self.hasher.take() else {
            self.failed = true;
            return None;
        };
        if self.failed {
            return None;
        }

        let mut out = [0u8; DIGEST_SIZE];
        out.copy_from_slice(&hasher.finalize());
        Some(WireDigest(out))
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn is_finished(&self) -> bool {
        self.hasher.is_none()
    }

    /// Total number of bytes folded in so far
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }
}

impl Default for DigestAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DigestAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestAccumulator")
            .field("bytes_seen", &self.bytes_seen)
            .field("finished", &self.is_finished())
            .field("failed", &self.failed)
            .finish()
    }
}
