//! Detection backends: image + instruction → free-text answer.
//!
//! Every backend implements [`DetectionBackend`]. The scan pipeline only
//! sees the trait object, so the local endpoint, the hosted endpoint and any
//! `edgequake-llm` provider are interchangeable and picked by
//! [`crate::config::BackendKind`] rather than by code edits.

pub mod hosted;
pub mod local;
pub mod provider;

pub use hosted::HostedBackend;
pub use local::LocalBackend;
pub use provider::ProviderBackend;

use crate::config::{BackendKind, ScanConfig};
use crate::error::{DetectError, Pdf2TableError};
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A vision-language service that answers one instruction about one image.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Short label used in logs and errors, e.g. `local`.
    fn name(&self) -> &'static str;

    /// Send one request and return the verbatim answer.
    async fn try_detect(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, DetectError>;

    /// Like [`Self::try_detect`], but a failure is logged and becomes `""`.
    async fn detect(&self, image: &EncodedImage, instruction: &str) -> String {
        match self.try_detect(image, instruction).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Detection request failed: {}", e);
                String::new()
            }
        }
    }
}

/// Resolve the backend for a scan.
///
/// A pre-built [`ScanConfig::backend`] wins; otherwise one is constructed
/// from [`ScanConfig::backend_kind`] and the endpoint settings.
pub async fn build_backend(config: &ScanConfig) -> Result<Arc<dyn DetectionBackend>, Pdf2TableError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let model = config.effective_model();
    let backend: Arc<dyn DetectionBackend> = match config.backend_kind {
        BackendKind::Local => Arc::new(LocalBackend::new(
            &config.local_endpoint_url,
            model,
            config.request_timeout_secs,
        )?),
        BackendKind::Hosted => {
            let credential = config.credential.as_deref().ok_or_else(|| {
                Pdf2TableError::InvalidConfig("The hosted backend requires a credential".into())
            })?;
            let mut hosted = HostedBackend::new(
                &config.hosted_endpoint_url,
                credential,
                model,
                config.request_timeout_secs,
            )?;
            if let Some(ref persona) = config.system_prompt {
                hosted = hosted.with_system_prompt(persona.clone());
            }
            Arc::new(hosted)
        }
        BackendKind::Provider => Arc::new(ProviderBackend::from_config(config)?),
    };
    Ok(backend)
}
