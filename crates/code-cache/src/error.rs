//! # Cache Errors
//!
//! Cache failures are never fatal to a compile: callers log them and carry
//! on without a cache. The types here exist so stores can report what went
//! wrong.

use std::path::PathBuf;

/// Structural problems with a serialized cache record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("malformed cache record: {actual} bytes, need at least {required}")]
    Malformed { actual: usize, required: usize },

    #[error("cache record header declares {declared} body bytes but {actual} are present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("artifact of {0} bytes does not fit in a cache record")]
    TooLarge(usize),
}

/// Errors returned by cache stores
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid cache record: {0}")]
    Record(#[from] RecordError),

    #[error("invalid cache entry metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result of a cache store operation
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = RecordError::Malformed {
            actual: 12,
            required: 40,
        };
        let msg = err.to_string();
        assert!(msg.contains("12 bytes"));
        assert!(msg.contains("at least 40"));
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let err = CacheError::io(
            "/tmp/code-cache/abc.bin",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("abc.bin"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_record_error_converts() {
        let err: CacheError = RecordError::TooLarge(7).into();
        assert!(matches!(err, CacheError::Record(RecordError::TooLarge(7))));
    }
}
