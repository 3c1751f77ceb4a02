//! Hosted OpenAI-compatible chat-completion endpoint.
//!
//! The image travels as a `data:` URI inside an `image_url` content block,
//! next to a text block carrying the instruction. Hosted services reject
//! image types they cannot decode with an opaque 400, so the MIME type is
//! checked before anything is sent.

use super::DetectionBackend;
use crate::error::{DetectError, Pdf2TableError};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "hosted";

/// MIME types accepted in `image_url` blocks.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Backend for a hosted vision model behind a chat-completion API.
#[derive(Clone)]
pub struct HostedBackend {
    client: ReqwestClient,
    completions_url: String,
    credential: String,
    model: String,
    system_prompt: String,
    timeout_secs: u64,
}

impl fmt::Debug for HostedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedBackend")
            .field("completions_url", &self.completions_url)
            .field("credential", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HostedBackend {
    /// `base_url` is the service root; `/chat/completions` is appended.
    pub fn new(
        base_url: &str,
        credential: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Pdf2TableError> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|source| Pdf2TableError::HttpClient {
                backend: NAME,
                source,
            })?;
        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            credential: credential.into(),
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs,
        })
    }

    /// Replace the default persona sent as the system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }
}

#[async_trait]
impl DetectionBackend for HostedBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn try_detect(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, DetectError> {
        if !SUPPORTED_MIME_TYPES.contains(&image.mime_type) {
            return Err(DetectError::UnsupportedFormat {
                backend: NAME,
                mime_type: image.mime_type.to_string(),
            });
        }

        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: vec![ContentBlock::Text {
                        text: &self.system_prompt,
                    }],
                },
                ChatMessage {
                    role: "user",
                    content: vec![
                        ContentBlock::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_uri(),
                            },
                        },
                        ContentBlock::Text { text: instruction },
                    ],
                },
            ],
        };
        debug!("POST {} (model {})", self.completions_url, self.model);

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.credential)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| DetectError::from_reqwest(NAME, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectError::Status {
                backend: NAME,
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| DetectError::from_reqwest(NAME, self.timeout_secs, e))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| DetectError::MalformedResponse {
                backend: NAME,
                detail: "response has no choices".into(),
            })
    }
}
