//! Error types for the pdf2table library.
//!
//! Four error types map onto four distinct failure scopes:
//!
//! * [`Pdf2TableError`] — **Fatal**: the scan cannot start at all (invalid
//!   configuration, no provider, HTTP client could not be built). Returned as
//!   `Err(Pdf2TableError)` from the top-level `scan*` functions.
//!
//! * [`ExtractError`] — **Document-level**: the PDF could not be opened or
//!   one of its images could not be materialised. Caught by the orchestrator
//!   and degraded to "zero images found"; never fatal.
//!
//! * [`DetectError`] — **Call-level**: one request to a detection backend
//!   failed. The detection step substitutes an empty answer and moves on.
//!
//! * [`ImageError`] — **Per-image record**: the serialisable form stored in
//!   [`crate::output::ImageReport`] so callers can inspect what went wrong
//!   after the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2table library.
#[derive(Debug, Error)]
pub enum Pdf2TableError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The generic provider backend could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The HTTP client for a detection backend could not be built.
    #[error("Failed to build HTTP client for the {backend} backend: {source}")]
    HttpClient {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure while materialising the embedded images of a document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file could not be read or is not a parseable PDF.
    #[error("Cannot open PDF '{path}': {detail}")]
    Open { path: PathBuf, detail: String },

    /// The document parsed but its page tree or resources are malformed.
    #[error("Malformed PDF structure on page {page}: {detail}")]
    Structure { page: usize, detail: String },

    /// The image stream uses a filter chain we cannot turn into a file.
    #[error("Image {object} on page {page} uses unsupported filter {filter}")]
    UnsupportedFilter {
        page: usize,
        object: String,
        filter: String,
    },

    /// The image samples use a colour layout we cannot encode.
    #[error("Image {object} on page {page} cannot be encoded: {detail}")]
    UnsupportedImage {
        page: usize,
        object: String,
        detail: String,
    },

    /// A FlateDecode stream failed to inflate.
    #[error("Image {object} on page {page}: inflate failed: {detail}")]
    Inflate {
        page: usize,
        object: String,
        detail: String,
    },

    /// PNG encoding of decoded samples failed.
    #[error("Image {object} on page {page}: PNG encoding failed: {source}")]
    Encode {
        page: usize,
        object: String,
        #[source]
        source: image::ImageError,
    },

    /// The output directory could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image file could not be written.
    #[error("Failed to write image file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking extraction task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Failure of a single request to a detection backend.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Connection refused, DNS failure, TLS failure, broken body.
    #[error("{backend}: request failed: {detail}")]
    Transport {
        backend: &'static str,
        detail: String,
    },

    /// The request exceeded the configured timeout.
    #[error("{backend}: request timed out after {secs}s")]
    Timeout { backend: &'static str, secs: u64 },

    /// The service answered with a non-success status.
    #[error("{backend}: HTTP {status}: {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },

    /// The body did not have the expected JSON shape.
    #[error("{backend}: malformed response: {detail}")]
    MalformedResponse {
        backend: &'static str,
        detail: String,
    },

    /// The backend does not accept this image type.
    #[error("{backend}: unsupported image type '{mime_type}'")]
    UnsupportedFormat {
        backend: &'static str,
        mime_type: String,
    },

    /// The generic provider layer returned an error.
    #[error("provider: {0}")]
    Provider(String),
}

impl DetectError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, transport failures, HTTP 429 and 5xx are transient. A 4xx,
    /// a malformed body or an unsupported image type will fail identically
    /// on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DetectError::Transport { .. } | DetectError::Timeout { .. } => true,
            DetectError::Status { status, .. } => *status == 429 || *status >= 500,
            DetectError::Provider(_) => true,
            DetectError::MalformedResponse { .. } | DetectError::UnsupportedFormat { .. } => false,
        }
    }

    /// Map a reqwest error, distinguishing timeouts.
    pub(crate) fn from_reqwest(backend: &'static str, timeout_secs: u64, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DetectError::Timeout {
                backend,
                secs: timeout_secs,
            }
        } else if e.is_decode() {
            DetectError::MalformedResponse {
                backend,
                detail: e.to_string(),
            }
        } else {
            DetectError::Transport {
                backend,
                detail: e.to_string(),
            }
        }
    }
}

/// A non-fatal error for a single image.
///
/// Stored alongside [`crate::output::ImageReport`] when an image fails.
/// The scan always continues with the next image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The image file could not be read back for encoding.
    #[error("{file}: encoding failed: {detail}")]
    EncodeFailed { file: String, detail: String },

    /// Every attempt against the detection backend failed.
    #[error("{file}: detection failed after {retries} retries: {detail}")]
    DetectFailed {
        file: String,
        retries: u32,
        detail: String,
    },
}
