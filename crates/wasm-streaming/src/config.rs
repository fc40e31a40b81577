use code_cache::WASM_MODULE_TAG;

/// Modules with fewer wire bytes than this are never written back
pub const DEFAULT_MIN_CACHEABLE_WIRE_BYTES: usize = 1024;

/// Configurable options for streaming compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Schema tag records are stored and looked up under
    pub cache_tag: u32,

    /// Smallest module, in wire bytes, worth writing back
    pub min_cacheable_wire_bytes: usize,

    /// Whether to consult and populate the response's code cache at all
    pub code_cache_enabled: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cache_tag: WASM_MODULE_TAG,
            min_cacheable_wire_bytes: DEFAULT_MIN_CACHEABLE_WIRE_BYTES,
            code_cache_enabled: true,
        }
    }
}

impl StreamingConfig {
    pub fn builder() -> crate::builder::StreamingConfigBuilder {
        crate::builder::StreamingConfigBuilder::new()
    }
}
