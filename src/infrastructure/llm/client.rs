//! HTTP client for the Anthropic Messages API and the refiner built on it.

use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Response};
use std::time::Duration;
use tracing::instrument;

use crate::domain::models::LlmConfig;
use crate::domain::ports::{ChatMessage, Refiner, RefinerError, Role};
use crate::infrastructure::logging::redact_api_key;

use super::errors::LlmApiError;
use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;
use super::types::{Message, MessageRequest, MessageResponse};

const API_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Rate-limited, retrying Messages API client.
pub struct AnthropicClient {
    http_client: ReqwestClient,
    base_url: String,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl AnthropicClient {
    /// Build a client from `config`, reading the key from `ANTHROPIC_API_KEY`
    /// when the config does not carry one.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmApiError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
            .ok_or(LlmApiError::MissingApiKey)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&api_key)
                .map_err(|e| LlmApiError::InvalidRequest(format!("Invalid API key header: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(API_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(4)
            .build()?;

        tracing::info!(
            base_url = %config.base_url,
            api_key = %redact_api_key(&api_key),
            rate_limit_rps = config.rate_limit_rps,
            max_retries = config.max_retries,
            "Initialized Messages API client"
        );

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: TokenBucketRateLimiter::new(config.rate_limit_rps),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    /// Send one request, retrying transient failures.
    pub async fn send_message(&self, request: &MessageRequest) -> Result<MessageResponse, LlmApiError> {
        self.retry_policy
            .execute(|| async {
                self.rate_limiter.acquire().await;
                self.execute_message_request(request).await
            })
            .await
    }

    async fn execute_message_request(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, LlmApiError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmApiError::Timeout
                } else {
                    LlmApiError::NetworkError(e)
                }
            })?;

        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> Result<MessageResponse, LlmApiError> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(LlmApiError::from_status(status, body))
    }
}

/// [`Refiner`] backed by the Messages API.
pub struct AnthropicRefiner {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicRefiner {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmApiError> {
        Ok(Self {
            client: AnthropicClient::new(config)?,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Translate a conversation into a request body.
    ///
    /// System turns are joined into the top-level `system` field and
    /// consecutive turns with the same role are merged, since the API
    /// requires user and assistant turns to alternate.
    pub fn build_request(&self, conversation: &[ChatMessage]) -> MessageRequest {
        let mut system: Vec<&str> = Vec::new();
        let mut messages: Vec<Message> = Vec::new();

        for turn in conversation {
            if turn.role == Role::System {
                system.push(&turn.content);
                continue;
            }
            let role = turn.role.to_string();
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&turn.content);
                }
                _ => messages.push(Message {
                    role,
                    content: turn.content.clone(),
                }),
            }
        }

        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            temperature: Some(self.temperature),
            messages,
        }
    }
}

#[async_trait]
impl Refiner for AnthropicRefiner {
    #[instrument(skip_all, fields(model = %self.model, turns = conversation.len()))]
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, RefinerError> {
        let request = self.build_request(conversation);
        let response = self
            .client
            .send_message(&request)
            .await
            .map_err(|e| RefinerError::Unavailable(e.to_string()))?;

        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "Completion received"
        );

        let text = response.text();
        if text.trim().is_empty() {
            return Err(RefinerError::EmptyResponse);
        }
        Ok(text)
    }
}
