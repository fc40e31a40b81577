//! # Cache Lookup Keys

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};

/// Identifies at most one stored record.
///
/// Stores index records by `scope` alone. The `tag` names the record schema
/// the caller understands; a stored record with any other tag reads as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheLookupKey {
    tag: u32,
    scope: Bytes,
}

impl CacheLookupKey {
    /// Create a key from an opaque scope
    pub fn new(tag: u32, scope: impl Into<Bytes>) -> Self {
        Self {
            tag,
            scope: scope.into(),
        }
    }

    /// Create a key scoped to a fetched resource.
    ///
    /// The scope combines the resource URL, the origin of the context that
    /// requested it and, for responses served from cache storage, the name of
    /// that storage cache. Each part carries a `u64` length prefix, wide
    /// enough for any string length.
    pub fn for_resource(
        tag: u32,
        url: &str,
        origin: &str,
        cache_storage_cache_name: Option<&str>,
    ) -> Self {
        let name = cache_storage_cache_name.unwrap_or_default();
        let mut scope = BytesMut::with_capacity(url.len() + origin.len() + name.len() + 24);
        for part in [url, origin, name] {
            scope.put_u64_le(part.len() as u64);
            scope.put_slice(part.as_bytes());
        }

        Self {
            tag,
            scope: scope.freeze(),
        }
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn scope(&self) -> &Bytes {
        &self.scope
    }

    /// Same scope under a different schema tag
    pub fn with_tag(&self, tag: u32) -> Self {
        Self {
            tag,
            scope: self.scope.clone(),
        }
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        let hash = Sha256::digest(&self.scope);
        hex::encode(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_scope_distinguishes_parts() {
        let a = CacheLookupKey::for_resource(2, "https://a.test/m.wasm", "https://a.test", None);
        let b = CacheLookupKey::for_resource(2, "https://a.test/m.wasm", "https://b.test", None);
        let c = CacheLookupKey::for_resource(
            2,
            "https://a.test/m.wasm",
            "https://a.test",
            Some("v1"),
        );

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.to_filename(), b.to_filename());
    }

    #[test]
    fn test_length_prefix_prevents_ambiguity() {
        let a = CacheLookupKey::for_resource(2, "ab", "c", None);
        let b = CacheLookupKey::for_resource(2, "a", "bc", None);
        assert_ne!(a.scope(), b.scope());
    }

    #[test]
    fn test_resource_scope_layout() {
        let key = CacheLookupKey::for_resource(2, "ab", "c", None);
        let mut expected = Vec::new();
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(b"c");
        expected.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(key.scope().as_ref(), expected.as_slice());
    }

    #[test]
    fn test_filename_ignores_tag() {
        let key = CacheLookupKey::new(2, "scope");
        assert_eq!(key.to_filename(), key.with_tag(1).to_filename());
        assert_eq!(key.to_filename().len(), 64);
        assert!(key.to_filename().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
