//! # Builder for StreamingConfig
//!
//! Fluent construction of [`StreamingConfig`] instances.
//!
//! # Example
//!
//! ```
//! use wasm_streaming::StreamingConfig;
//!
//! let config = StreamingConfig::builder()
//!     .with_min_cacheable_wire_bytes(4096)
//!     .with_code_cache_enabled(true)
//!     .build();
//!
//! assert_eq!(config.min_cacheable_wire_bytes, 4096);
//! ```

use crate::StreamingConfig;

/// Builder for creating StreamingConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct StreamingConfigBuilder {
    config: StreamingConfig,
}

impl StreamingConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: StreamingConfig::default(),
        }
    }

    /// Set the schema tag records are keyed under
    pub fn with_cache_tag(mut self, tag: u32) -> Self {
        self.config.cache_tag = tag;
        self
    }

    /// Set the smallest module size that is written back
    pub fn with_min_cacheable_wire_bytes(mut self, bytes: usize) -> Self {
        self.config.min_cacheable_wire_bytes = bytes;
        self
    }

    /// Enable or disable the code cache
    pub fn with_code_cache_enabled(mut self, enabled: bool) -> Self {
        self.config.code_cache_enabled = enabled;
        self
    }

    /// Build the StreamingConfig instance
    pub fn build(self) -> StreamingConfig {
        self.config
    }
}

impl Default for StreamingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
