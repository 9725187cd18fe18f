//! Anthropic Messages API backend.

use super::{
    ContentBlock, FollowUpRequest, GenerationBackend, InitialRequest, Message, ModelResponse,
    StopReason, ToolChoice, MAX_TOKENS, TEMPERATURE,
};
use crate::error::{Result, SyllabusError};
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Request body for `POST /v1/messages`.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDescriptor]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

/// The parts of a Messages API response this client reads.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
}

/// Backend for the Anthropic Messages API.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: &str,
        base_url: Option<&url::Url>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyllabusError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.to_string(),
            base_url: base_url
                .map(|u| u.as_str().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| SyllabusError::Config(format!("Invalid API key header: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<ModelResponse> {
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| SyllabusError::Provider {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyllabusError::Provider {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            SyllabusError::Generation(format!("Failed to parse response: {}\nBody: {}", e, body))
        })?;
        debug!(stop_reason = ?parsed.stop_reason, "Model responded");

        Ok(ModelResponse {
            content: parsed.content,
            stop_reason: parsed.stop_reason,
        })
    }
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all)]
    async fn create(&self, request: &InitialRequest) -> Result<ModelResponse> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: &request.system,
            messages: &request.messages,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            tool_choice: request.tool_choice,
        };
        self.send(&body).await
    }

    #[instrument(skip_all)]
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<ModelResponse> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: &request.system,
            messages: &request.messages,
            tools: None,
            tool_choice: None,
        };
        self.send(&body).await
    }
}
