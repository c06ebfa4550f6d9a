//! LLM provider seam.
//!
//! [`LlmProvider`] is the only thing the engine knows about the model vendor:
//! send a system instruction and a user message, receive text.

use async_trait::async_trait;

use crate::error::Result;

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Run one completion and return the response text.
    ///
    /// Errors: `ProviderAuth` for rejected credentials, `ProviderRateLimited`,
    /// `ProviderUnavailable` for transport failures and server errors, and
    /// `MalformedResponse` when a successful response carries no text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[cfg(feature = "provider")]
pub use anthropic::AnthropicProvider;

#[cfg(feature = "provider")]
mod anthropic {
    use async_trait::async_trait;
    use reqwest::{Client, StatusCode};
    use serde::{Deserialize, Serialize};
    use tracing::{debug, warn};

    use super::{CompletionRequest, LlmProvider};
    use crate::config::AnalysisConfig;
    use crate::error::{Error, Result};

    const API_VERSION: &str = "2023-06-01";

    /// Anthropic Messages API provider
    pub struct AnthropicProvider {
        client: Client,
        api_key: String,
        base_url: String,
        model: String,
    }

    impl AnthropicProvider {
        pub fn new(api_key: impl Into<String>, config: &AnalysisConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.request_timeout())
                .build()
                .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

            Ok(Self {
                client,
                api_key: api_key.into(),
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                model: config.model.clone(),
            })
        }

        /// Build from the configured credential, if there is one
        pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>> {
            match config.api_key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => Self::new(key, config).map(Some),
                _ => Ok(None),
            }
        }
    }

    #[derive(Debug, Serialize)]
    struct MessagesRequest<'a> {
        model: &'a str,
        max_tokens: u32,
        temperature: f32,
        system: &'a str,
        messages: Vec<Message<'a>>,
    }

    #[derive(Debug, Serialize)]
    struct Message<'a> {
        role: &'a str,
        content: &'a str,
    }

    #[derive(Debug, Deserialize)]
    struct MessagesResponse {
        #[serde(default)]
        content: Vec<ContentBlock>,
    }

    #[derive(Debug, Deserialize)]
    struct ContentBlock {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        message: String,
    }

    /// Translate a non-success status into the crate's provider errors
    pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::ProviderAuth(message),
            StatusCode::TOO_MANY_REQUESTS => Error::ProviderRateLimited,
            s => Error::ProviderUnavailable(format!("HTTP {}: {}", s.as_u16(), message)),
        }
    }

    #[async_trait]
    impl LlmProvider for AnthropicProvider {
        fn name(&self) -> &str {
            "anthropic"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            let body = MessagesRequest {
                model: &self.model,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
                system: &request.system,
                messages: vec![Message {
                    role: "user",
                    content: &request.user,
                }],
            };

            let url = format!("{}/v1/messages", self.base_url);
            debug!(model = %self.model, chars = request.user.len(), "Provider request");

            let resp = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                let err = status_error(status, &text);
                warn!(status = status.as_u16(), error = %err, "Provider request failed");
                return Err(err);
            }

            let parsed: MessagesResponse = resp
                .json()
                .await
                .map_err(|e| Error::MalformedResponse(e.to_string()))?;

            let text: String = parsed
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.text)
                .collect::<Vec<_>>()
                .join("");

            if text.trim().is_empty() {
                return Err(Error::MalformedResponse("response has no text content".into()));
            }
            Ok(text)
        }
    }
}
