//! Configuration types for a PDF table scan.
//!
//! All scan behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. Paths, endpoints, the credential and the model
//! identifier all live here and are passed into the orchestrator; nothing is
//! read from module-level constants at call time.

use crate::backend::DetectionBackend;
use crate::error::Pdf2TableError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default address of the local generation endpoint (Ollama).
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default base address of the hosted OpenAI-compatible endpoint.
pub const DEFAULT_HOSTED_ENDPOINT: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Default model for the local backend.
pub const DEFAULT_LOCAL_MODEL: &str = "minicpm-v:latest";

/// Default model for the hosted backend.
pub const DEFAULT_HOSTED_MODEL: &str = "qwen2.5-vl-72b-instruct";

/// Default model for the generic provider backend.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Which detection backend to build when no pre-built one is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local synchronous generation endpoint (default).
    #[default]
    Local,
    /// Hosted chat-completion endpoint with a pre-shared credential.
    Hosted,
    /// Any vision provider known to `edgequake-llm`, auto-detected from the
    /// environment unless [`ScanConfig::provider_name`] is set.
    Provider,
}

impl BackendKind {
    /// Model used when [`ScanConfig::model_id`] is `None`.
    pub fn default_model(self) -> &'static str {
        match self {
            BackendKind::Local => DEFAULT_LOCAL_MODEL,
            BackendKind::Hosted => DEFAULT_HOSTED_MODEL,
            BackendKind::Provider => DEFAULT_PROVIDER_MODEL,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Local => "local",
            BackendKind::Hosted => "hosted",
            BackendKind::Provider => "provider",
        })
    }
}

/// Configuration for a scan.
///
/// Built via [`ScanConfig::builder()`] or using [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2table::{BackendKind, ScanConfig};
///
/// let config = ScanConfig::builder()
///     .pdf_path("report.pdf")
///     .output_dir("report_images")
///     .backend_kind(BackendKind::Hosted)
///     .credential("sk-test")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// PDF document to scan. Default: `pdf_with_table.pdf`.
    pub pdf_path: PathBuf,

    /// Directory receiving the extracted images. Created if absent.
    /// Default: `output_folder`.
    pub output_dir: PathBuf,

    /// Backend to build when [`Self::backend`] is `None`. Default: local.
    pub backend_kind: BackendKind,

    /// Pre-constructed backend. Takes precedence over `backend_kind`.
    pub backend: Option<Arc<dyn DetectionBackend>>,

    /// Full URL of the local generation endpoint.
    pub local_endpoint_url: String,

    /// Base URL of the hosted endpoint; `/chat/completions` is appended.
    pub hosted_endpoint_url: String,

    /// Pre-shared credential for the hosted endpoint.
    pub credential: Option<String>,

    /// Model identifier. If None, uses [`BackendKind::default_model`].
    pub model_id: Option<String>,

    /// Provider name for [`BackendKind::Provider`] (e.g. "openai", "ollama").
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Custom detection instruction. If None, uses the built-in default.
    pub instruction: Option<String>,

    /// Custom persona for chat-style backends. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// Local vision models on a CPU can take well over a minute per image.
    /// Without a bound, a hung backend would block the whole scan.
    pub request_timeout_secs: u64,

    /// Retries of a transient backend failure within one detection step.
    /// Default: 0, i.e. exactly one request per image.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Number of images in flight at once. Default: 1 (strictly sequential).
    ///
    /// Results are always reported in extraction order whatever the value.
    pub concurrency: usize,

    /// Sampling temperature ([`BackendKind::Provider`] only). Default: 0.1.
    pub temperature: f32,

    /// Maximum output tokens ([`BackendKind::Provider`] only). Default: 4096.
    pub max_tokens: usize,

    /// Reporting sink for per-image events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pdf_path: PathBuf::from("pdf_with_table.pdf"),
            output_dir: PathBuf::from("output_folder"),
            backend_kind: BackendKind::default(),
            backend: None,
            local_endpoint_url: DEFAULT_LOCAL_ENDPOINT.to_string(),
            hosted_endpoint_url: DEFAULT_HOSTED_ENDPOINT.to_string(),
            credential: None,
            model_id: None,
            provider_name: None,
            instruction: None,
            system_prompt: None,
            request_timeout_secs: 120,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 1,
            temperature: 0.1,
            max_tokens: 4096,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("pdf_path", &self.pdf_path)
            .field("output_dir", &self.output_dir)
            .field("backend_kind", &self.backend_kind)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("local_endpoint_url", &self.local_endpoint_url)
            .field("hosted_endpoint_url", &self.hosted_endpoint_url)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("provider_name", &self.provider_name)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model identifier in effect for the configured backend kind.
    pub fn effective_model(&self) -> &str {
        self.model_id
            .as_deref()
            .unwrap_or_else(|| self.backend_kind.default_model())
    }
}

/// Builder for [`ScanConfig`].
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl fmt::Debug for ScanConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ScanConfigBuilder {
    pub fn pdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdf_path = path.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn backend_kind(mut self, kind: BackendKind) -> Self {
        self.config.backend_kind = kind;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn DetectionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn local_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.local_endpoint_url = url.into();
        self
    }

    pub fn hosted_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.hosted_endpoint_url = url.into();
        self
    }

    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.config.credential = Some(credential.into());
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, Pdf2TableError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        // A pre-built backend bypasses endpoint settings entirely.
        if c.backend.is_none() {
            match c.backend_kind {
                BackendKind::Local => check_http_url("local endpoint", &c.local_endpoint_url)?,
                BackendKind::Hosted => {
                    check_http_url("hosted endpoint", &c.hosted_endpoint_url)?;
                    if c.credential.as_deref().is_none_or(str::is_empty) {
                        return Err(Pdf2TableError::InvalidConfig(
                            "The hosted backend requires a credential (--api-key / PDF2TABLE_API_KEY)"
                                .into(),
                        ));
                    }
                }
                BackendKind::Provider => {}
            }
        }
        Ok(self.config)
    }
}

fn check_http_url(what: &str, url: &str) -> Result<(), Pdf2TableError> {
    match reqwest::Url::parse(url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
        Ok(u) => Err(Pdf2TableError::InvalidConfig(format!(
            "{what} must be an http(s) URL, got scheme '{}'",
            u.scheme()
        ))),
        Err(e) => Err(Pdf2TableError::InvalidConfig(format!(
            "{what} '{url}' is not a valid URL: {e}"
        ))),
    }
}
