/// Failures reported by a byte source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("body stream errored: {0}")]
    Stream(String),
}

/// A caller-supplied precondition that failed before streaming started
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("an argument must be provided, which must be a Response object")]
    NotAResponse,

    #[error("HTTP status code {0} is not ok")]
    StatusNotOk(u16),

    #[error("incorrect response MIME type {0:?}, expected 'application/wasm'")]
    IncorrectMimeType(String),

    #[error("cannot compile a module from an already read Response")]
    BodyAlreadyUsed,

    #[error("empty WebAssembly module")]
    EmptyModule,
}

/// Structured reason carried by an abort delivered to the compiler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamingError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("could not download wasm module: {0}")]
    SourceRead(#[from] SourceError),

    #[error("could not download wasm module")]
    DownloadFailed,

    #[error("the compilation was aborted")]
    Aborted,
}
