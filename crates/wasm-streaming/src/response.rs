//! # Streaming From a Response
//!
//! [`stream_from_response`] is the entry point for compiling a module while
//! its response body is still downloading. It checks that the response can
//! be compiled at all, wires up the code cache when the response carries one,
//! and starts an ingestor on the body. Every failure before ingestion begins
//! reaches the compiler as exactly one abort.

use std::fmt;
use std::sync::Arc;

use code_cache::{CacheLookupKey, CacheStore};
use tracing::{debug, warn};

use crate::abort::AbortBridge;
use crate::compiler::{AbortReason, Compiler, CompletionToken};
use crate::config::StreamingConfig;
use crate::context::ContextHandle;
use crate::error::SetupError;
use crate::ingestor::{CompletionSink, IngestorHandle, StreamingIngestor};
use crate::resolver::CacheValidityResolver;
use crate::source::ByteSource;
use crate::write_back::WriteBackClient;

/// The only MIME type a streamed module may be served with
pub const WASM_MIME_TYPE: &str = "application/wasm";

/// A fetched response whose body holds module bytes
pub struct Response {
    url: String,
    status: u16,
    content_type: Option<String>,
    body: Option<Box<dyn ByteSource>>,
    body_used: bool,
    body_locked: bool,
    cache_store: Option<Arc<dyn CacheStore>>,
    cache_storage_cache_name: Option<String>,
}

impl Response {
    /// A `200` response for `url` with no headers and no body
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: None,
            body: None,
            body_used: false,
            body_locked: false,
            cache_store: None,
            cache_storage_cache_name: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_body(mut self, body: impl ByteSource + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Mark the body as already consumed by someone else
    pub fn with_body_used(mut self) -> Self {
        self.body_used = true;
        self
    }

    /// Mark the body as locked to another reader
    pub fn with_body_locked(mut self) -> Self {
        self.body_locked = true;
        self
    }

    /// Attach the code cache this response's compiled form may live in
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// The response was served from the named cache storage cache
    pub fn with_cache_storage_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_storage_cache_name = Some(name.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status in the 200-299 range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("has_body", &self.body.is_some())
            .field("body_used", &self.body_used)
            .field("body_locked", &self.body_locked)
            .field("has_cache_store", &self.cache_store.is_some())
            .finish()
    }
}

/// Check `response` can be compiled and take its body
fn validate(response: Option<Response>) -> Result<(Response, Box<dyn ByteSource>), SetupError> {
    let mut response = response.ok_or(SetupError::NotAResponse)?;

    if !response.ok() {
        return Err(SetupError::StatusNotOk(response.status));
    }

    let mime = response
        .content_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if mime != WASM_MIME_TYPE {
        return Err(SetupError::IncorrectMimeType(mime));
    }

    if response.body_used || response.body_locked {
        return Err(SetupError::BodyAlreadyUsed);
    }

    let body = response.body.take().ok_or(SetupError::EmptyModule)?;
    Ok((response, body))
}

/// Compile the module in `response` as its body streams in.
///
/// Returns a handle to the running ingestor, or `None` if setup failed, in
/// which case `compiler` has already been aborted and `sink` notified.
pub fn stream_from_response(
    context: &ContextHandle,
    response: Option<Response>,
    compiler: Arc<dyn Compiler>,
    config: &StreamingConfig,
    mut sink: Box<dyn CompletionSink>,
) -> Option<IngestorHandle> {
    let mut bridge = AbortBridge::new(CompletionToken::new(compiler.clone()));

    let Some(context) = context.get() else {
        debug!("Execution context gone, aborting streaming compilation silently");
        bridge.abort_silently();
        bridge.finish();
        sink.on_aborted(&AbortReason::Silent);
        return None;
    };

    let (response, body) = match validate(response) {
        Ok(validated) => validated,
        Err(e) => {
            warn!(error = %e, "Cannot stream module from response");
            let reason = AbortReason::Error(e.clone().into());
            bridge.fail(e);
            bridge.finish();
            sink.on_aborted(&reason);
            return None;
        }
    };

    let url = response.url;
    compiler.set_url(&url);

    let key = CacheLookupKey::for_resource(
        config.cache_tag,
        &url,
        context.origin(),
        response.cache_storage_cache_name.as_deref(),
    );
    let store = response.cache_store.filter(|_| config.code_cache_enabled);
    let write_back = store.as_ref().map(|_| {
        let client = Arc::new(WriteBackClient::new(
            url.clone(),
            key.clone(),
            config.min_cacheable_wire_bytes,
            context.task_runner(),
            context.handle(),
        ));
        compiler.set_client(client.clone());
        client
    });
    debug!(url = %url, cached = store.is_some(), "Starting streaming compilation");

    let resolver = CacheValidityResolver::new(key, store, write_back);
    let token = bridge.release()?;
    let handle = IngestorHandle::new(StreamingIngestor::new(
        url,
        token,
        resolver,
        context.handle(),
    ));
    handle.start(body, sink);
    Some(handle)
}
