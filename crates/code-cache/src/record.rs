//! # Cache Records
//!
//! A cache record is an immutable byte buffer with the layout
//!
//! ```text
//! [tag: u32 LE][body_len: u32 LE][digest: 32 bytes][artifact bytes]
//! ```
//!
//! where `body_len` counts the digest and the artifact. The digest is the
//! SHA-256 of the wire bytes the artifact was compiled from; the artifact is
//! opaque to this crate.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::digest::{DIGEST_SIZE, WireDigest};
use crate::error::RecordError;

/// Tag for the current compiled module record layout.
pub const WASM_MODULE_TAG: u32 = 2;

/// Tag written by the previous record layout. Never decoded.
pub const RETIRED_WASM_MODULE_TAG: u32 = 1;

/// Size of the `[tag][body_len]` header
pub const HEADER_SIZE: usize = 8;

/// An immutable, serialized cache record.
///
/// Cloning is cheap; clones share the underlying buffer, which keeps the
/// artifact alive for as long as any holder needs it.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheRecord {
    serialized: Bytes,
}

impl CacheRecord {
    /// Build a record from a digest and an artifact
    pub fn new(tag: u32, digest: &WireDigest, artifact: &[u8]) -> Result<Self, RecordError> {
        let body_len = DIGEST_SIZE + artifact.len();
        let declared =
            u32::try_from(body_len).map_err(|_| RecordError::TooLarge(artifact.len()))?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body_len);
        buf.put_u32_le(tag);
        buf.put_u32_le(declared);
        buf.put_slice(digest.as_bytes());
        buf.put_slice(artifact);

        Ok(Self {
            serialized: buf.freeze(),
        })
    }

    /// Build a record around an arbitrary body.
    ///
    /// The body is not required to hold a digest; readers check that with
    /// [`digest`](Self::digest) and [`artifact`](Self::artifact).
    pub fn from_body(tag: u32, body: &[u8]) -> Result<Self, RecordError> {
        let declared = u32::try_from(body.len()).map_err(|_| RecordError::TooLarge(body.len()))?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        buf.put_u32_le(tag);
        buf.put_u32_le(declared);
        buf.put_slice(body);

        Ok(Self {
            serialized: buf.freeze(),
        })
    }

    /// Parse a serialized record, validating only its header
    pub fn from_serialized(serialized: Bytes) -> Result<Self, RecordError> {
        if serialized.len() < HEADER_SIZE {
            return Err(RecordError::Malformed {
                actual: serialized.len(),
                required: HEADER_SIZE,
            });
        }

        let mut header = &serialized[..HEADER_SIZE];
        let _tag = header.get_u32_le();
        let declared = header.get_u32_le() as usize;
        let actual = serialized.len() - HEADER_SIZE;
        if declared != actual {
            return Err(RecordError::LengthMismatch { declared, actual });
        }

        Ok(Self { serialized })
    }

    pub fn tag(&self) -> u32 {
        let mut header = &self.serialized[..HEADER_SIZE];
        header.get_u32_le()
    }

    /// Digest and artifact, without the header
    pub fn body(&self) -> &[u8] {
        &self.serialized[HEADER_SIZE..]
    }

    /// Total size declared by the header
    pub fn body_len(&self) -> usize {
        self.serialized.len() - HEADER_SIZE
    }

    /// The stored wire byte digest, or `None` if the body is too short to hold one
    pub fn digest(&self) -> Option<WireDigest> {
        WireDigest::from_prefix(self.body())
    }

    /// The artifact following the digest, or `None` if the body is too short
    pub fn artifact(&self) -> Option<&[u8]> {
        self.body().get(DIGEST_SIZE..)
    }

    /// The complete serialized form, header included
    pub fn as_bytes(&self) -> &Bytes {
        &self.serialized
    }

    pub fn into_bytes(self) -> Bytes {
        self.serialized
    }
}

impl fmt::Debug for CacheRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRecord")
            .field("tag", &self.tag())
            .field("body_len", &self.body_len())
            .finish()
    }
}

/// Borrowed view of a decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    pub tag: u32,
    pub digest: WireDigest,
    pub payload: &'a [u8],
}

/// Serialize a record
pub fn encode(tag: u32, digest: &WireDigest, payload: &[u8]) -> Result<Bytes, RecordError> {
    CacheRecord::new(tag, digest, payload).map(CacheRecord::into_bytes)
}

/// Split a serialized record into tag, digest and payload.
///
/// Fails with [`RecordError::Malformed`] if the input cannot hold a header and
/// a digest, and with [`RecordError::LengthMismatch`] if the header disagrees
/// with the input length.
pub fn decode(bytes: &[u8]) -> Result<DecodedRecord<'_>, RecordError> {
    let required = HEADER_SIZE + DIGEST_SIZE;
    if bytes.len() < required {
        return Err(RecordError::Malformed {
            actual: bytes.len(),
            required,
        });
    }

    let mut header = &bytes[..HEADER_SIZE];
    let tag = header.get_u32_le();
    let declared = header.get_u32_le() as usize;
    let body = &bytes[HEADER_SIZE..];
    if declared != body.len() {
        return Err(RecordError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }

    let (digest, payload) = body.split_at(DIGEST_SIZE);
    let digest = WireDigest::from_prefix(digest).ok_or(RecordError::Malformed {
        actual: bytes.len(),
        required,
    })?;

    Ok(DecodedRecord {
        tag,
        digest,
        payload,
    })
}
