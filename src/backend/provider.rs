//! Backend over any vision-capable `edgequake-llm` provider.
//!
//! Useful when the model lives behind OpenAI, Anthropic, Gemini, Azure or a
//! local Ollama that `edgequake-llm` already knows how to talk to. The
//! message layout mirrors the hosted backend: persona as the system message,
//! image plus instruction as the user message.

use super::DetectionBackend;
use crate::config::ScanConfig;
use crate::error::{DetectError, Pdf2TableError};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Backend wrapping an `Arc<dyn LLMProvider>`.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            options: CompletionOptions {
                temperature: Some(0.1),
                max_tokens: Some(4096),
                ..Default::default()
            },
            timeout_secs: 120,
        }
    }

    /// Bound every provider call to `secs` seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Resolve a provider from the scan configuration and the environment.
    ///
    /// Resolution order:
    /// 1. [`ScanConfig::provider_name`] with the effective model.
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
    /// 3. `OPENAI_API_KEY` present → `openai`.
    /// 4. [`ProviderFactory::from_env`] auto-detection.
    pub fn from_config(config: &ScanConfig) -> Result<Self, Pdf2TableError> {
        let provider = resolve_provider(config)?;
        let mut backend = Self::new(provider).with_timeout(config.request_timeout_secs);
        backend.options = build_options(config);
        if let Some(ref persona) = config.system_prompt {
            backend.system_prompt = persona.clone();
        }
        Ok(backend)
    }
}

fn build_options(config: &ScanConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2TableError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2TableError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, Pdf2TableError> {
    let model = config.effective_model();

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2TableError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[async_trait]
impl DetectionBackend for ProviderBackend {
    fn name(&self) -> &'static str {
        "provider"
    }

    async fn try_detect(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, DetectError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(
                instruction,
                vec![ImageData::new(image.data.clone(), image.mime_type)],
            ),
        ];

        let call = self.provider.chat(&messages, Some(&self.options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| DetectError::Timeout {
                backend: "provider",
                secs: self.timeout_secs,
            })?
            .map_err(|e| DetectError::Provider(e.to_string()))?;
        debug!(
            "provider: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError};
    use std::sync::Mutex;

    enum Answer {
        Text(&'static str),
        Fail,
        Hang,
    }

    /// Provider that records the messages it is sent.
    struct StubProvider {
        answer: Answer,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl StubProvider {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-vision"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            Err(LlmError::InvalidRequest("chat only".into()))
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            match self.answer {
                Answer::Text(text) => Ok(LLMResponse::new(text, "stub-vision")),
                Answer::Fail => Err(LlmError::ApiError("upstream down".into())),
                Answer::Hang => futures::future::pending().await,
            }
        }
    }

    fn jpeg() -> EncodedImage {
        EncodedImage {
            data: "/9j/AAAA".to_string(),
            mime_type: "image/jpeg",
        }
    }

    #[test]
    fn build_options_defaults() {
        let config = ScanConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(config.temperature));
        assert_eq!(opts.max_tokens, Some(config.max_tokens));
    }

    #[tokio::test]
    async fn sends_persona_then_image_with_instruction() {
        let stub = StubProvider::new(Answer::Text("No table"));
        let backend = ProviderBackend::new(stub.clone());

        let text = backend.try_detect(&jpeg(), "find tables").await.unwrap();
        assert_eq!(text, "No table");

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, ChatRole::System);
        assert_eq!(seen[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(seen[1].role, ChatRole::User);
        assert_eq!(seen[1].content, "find tables");
        let images = seen[1].images.as_ref().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/jpeg");
        assert_eq!(images[0].data, "/9j/AAAA");
    }

    #[tokio::test]
    async fn provider_error_is_transient() {
        let backend = ProviderBackend::new(StubProvider::new(Answer::Fail));
        let err = backend.try_detect(&jpeg(), "x").await.unwrap_err();
        assert!(matches!(err, DetectError::Provider(_)), "got: {err:?}");
        assert!(err.is_transient());
        assert_eq!(backend.detect(&jpeg(), "x").await, "");
    }

    #[tokio::test]
    async fn hung_provider_times_out() {
        let backend = ProviderBackend::new(StubProvider::new(Answer::Hang)).with_timeout(1);
        let err = backend.try_detect(&jpeg(), "x").await.unwrap_err();
        assert!(
            matches!(err, DetectError::Timeout { backend: "provider", secs: 1 }),
            "got: {err:?}"
        );
    }
}
