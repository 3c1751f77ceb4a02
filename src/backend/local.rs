//! Local synchronous generation endpoint (Ollama `/api/generate` shape).

use super::DetectionBackend;
use crate::error::{DetectError, Pdf2TableError};
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const NAME: &str = "local";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: [&'a str; 1],
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Backend for a local vision model served over a non-streaming generate API.
#[derive(Clone, Debug)]
pub struct LocalBackend {
    client: ReqwestClient,
    endpoint_url: String,
    model: String,
    timeout_secs: u64,
}

impl LocalBackend {
    /// `endpoint_url` is the full generate URL, e.g.
    /// `http://localhost:11434/api/generate`.
    pub fn new(
        endpoint_url: impl Into<String>,
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
            endpoint_url: endpoint_url.into(),
            model: model.into(),
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl DetectionBackend for LocalBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn try_detect(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, DetectError> {
        let request_body = GenerateRequest {
            model: &self.model,
            prompt: instruction,
            stream: false,
            images: [image.data.as_str()],
        };
        debug!("POST {} (model {})", self.endpoint_url, self.model);

        let response = self
            .client
            .post(&self.endpoint_url)
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

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DetectError::from_reqwest(NAME, self.timeout_secs, e))?;
        Ok(generated.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image() -> EncodedImage {
        EncodedImage {
            data: "iVBORw0KGgo=".into(),
            mime_type: "image/png",
        }
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(GenerateRequest {
            model: "minicpm-v:latest",
            prompt: "find tables",
            stream: false,
            images: ["AAAA"],
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "minicpm-v:latest",
                "prompt": "find tables",
                "stream": false,
                "images": ["AAAA"]
            })
        );
    }

    #[tokio::test]
    async fn returns_response_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "minicpm-v:latest",
                "stream": false,
                "images": ["iVBORw0KGgo="]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "minicpm-v:latest",
                "response": "| a | b |\n|---|---|\n| 1 | 2 |",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = LocalBackend::new(
            format!("{}/api/generate", server.uri()),
            "minicpm-v:latest",
            5,
        )
        .unwrap();
        let text = backend.try_detect(&image(), "find tables").await.unwrap();
        assert!(text.starts_with("| a | b |"));
    }

    #[tokio::test]
    async fn missing_response_field_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
            .mount(&server)
            .await;

        let backend = LocalBackend::new(server.uri(), "m", 5).unwrap();
        assert_eq!(backend.try_detect(&image(), "x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let backend = LocalBackend::new(server.uri(), "m", 5).unwrap();
        let err = backend.try_detect(&image(), "x").await.unwrap_err();
        match err {
            DetectError::Status { status, ref body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.detect(&image(), "x").await, "");
    }

    #[tokio::test]
    async fn unreachable_is_transport_error() {
        let backend = LocalBackend::new("http://127.0.0.1:1/api/generate", "m", 5).unwrap();
        let err = backend.try_detect(&image(), "x").await.unwrap_err();
        assert!(err.is_transient(), "got: {err:?}");
    }
}
