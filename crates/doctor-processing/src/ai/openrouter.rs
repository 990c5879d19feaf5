//! OpenRouter AI provider implementation.
//!
//! This module provides the [`OpenRouterProvider`] which implements the [`AIProvider`]
//! trait for the OpenRouter API (<https://openrouter.ai/>).
//!
//! OpenRouter exposes many models behind one chat-completions API. JSON
//! requests set `response_format: {"type": "json_object"}`.

use super::http::{request_failure, status_failure};
use super::provider::{TransientError, is_retryable_status};
use super::{AIProvider, CompletionRequest};
use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default OpenRouter API endpoint.
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model used for diagnosis.
const DEFAULT_MODEL: &str = "google/gemini-2.5-pro";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default temperature for model responses (low for deterministic outputs).
const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default max tokens for responses.
const DEFAULT_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
}

/// OpenRouter sometimes reports upstream failures with a 200 status.
#[derive(Debug, Deserialize)]
struct OpenRouterErrorBody {
    error: OpenRouterErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorDetail {
    message: String,
    code: Option<u16>,
}

/// Configuration for the OpenRouter provider.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// The model to use (e.g., "google/gemini-2.5-pro", "openai/gpt-4o").
    pub model: String,
    /// Temperature for response generation (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Base URL for the API (useful for proxies or custom endpoints).
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl OpenRouterConfig {
    /// Create a new configuration builder.
    pub fn builder() -> OpenRouterConfigBuilder {
        OpenRouterConfigBuilder::default()
    }
}

/// Builder for [`OpenRouterConfig`].
#[derive(Default)]
pub struct OpenRouterConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl OpenRouterConfigBuilder {
    /// Set the model to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature (0.0 - 2.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Set a custom base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenRouterConfig {
        OpenRouterConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

/// OpenRouter AI provider.
///
/// # Example
///
/// ```rust,ignore
/// use doctor_processing::ai::{OpenRouterProvider, OpenRouterConfig};
///
/// let config = OpenRouterConfig::builder()
///     .model("openai/gpt-4o")
///     .build();
/// let provider = OpenRouterProvider::with_config("your-api-key", config)?;
/// ```
pub struct OpenRouterProvider {
    api_key: String,
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, OpenRouterConfig::default())
    }

    /// Create a new OpenRouter provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: OpenRouterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            api_key: api_key.into(),
            config,
            client,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenRouterRequest {
        OpenRouterRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    fn call_api(&self, request: &OpenRouterRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "Data Doctor")
            .json(request)
            .send()
            .map_err(|e| request_failure(self.name(), e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| request_failure(self.name(), e))?;

        if !status.is_success() {
            return Err(status_failure(self.name(), status, &body));
        }

        debug!(provider = self.name(), bytes = body.len(), "Received response");
        extract_content(&body)
    }
}

/// Pull the first choice's message content out of a 200 response body.
fn extract_content(body: &str) -> Result<String> {
    if let Ok(err_body) = serde_json::from_str::<OpenRouterErrorBody>(body) {
        let message = format!("OpenRouter error: {}", err_body.error.message);
        // Missing codes are upstream hiccups more often than not
        let retryable = err_body.error.code.is_none_or(is_retryable_status);
        return Err(if retryable {
            TransientError::new(message).into()
        } else {
            anyhow!(message)
        });
    }

    let result: OpenRouterResponse = serde_json::from_str(body)
        .map_err(|e| anyhow!("Unexpected OpenRouter response shape: {}", e))?;

    result
        .choices
        .as_ref()
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.message.as_ref())
        .map(|msg| msg.content.clone())
        .ok_or_else(|| anyhow!("No response content from OpenRouter API"))
}

impl AIProvider for OpenRouterProvider {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);
        self.call_api(&body)
    }

    fn name(&self) -> &str {
        "OpenRouter"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::is_transient;

    #[test]
    fn test_extract_content_valid_response() {
        let json = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "{\"diagnosis_summary\": \"ok\"}"}
            }]
        }"#;
        assert_eq!(
            extract_content(json).unwrap(),
            r#"{"diagnosis_summary": "ok"}"#
        );
    }

    #[test]
    fn test_extract_content_missing_choices() {
        assert!(extract_content(r#"{"choices": []}"#).is_err());
        assert!(extract_content(r#"{"choices": null}"#).is_err());
        assert!(extract_content(r#"{"choices": [{"message": null}]}"#).is_err());
    }

    #[test]
    fn test_error_body_with_200_status() {
        let json = r#"{"error": {"message": "Upstream overloaded", "code": 502}}"#;
        let err = extract_content(json).unwrap_err();
        assert!(is_transient(&err));
        assert!(err.to_string().contains("Upstream overloaded"));

        let json = r#"{"error": {"message": "Model not found", "code": 404}}"#;
        assert!(!is_transient(&extract_content(json).unwrap_err()));

        let json = r#"{"error": {"message": "Something broke"}}"#;
        assert!(is_transient(&extract_content(json).unwrap_err()));
    }

    #[test]
    fn test_json_request_sets_response_format() {
        let provider = OpenRouterProvider::new("test-key").unwrap();
        let value =
            serde_json::to_value(provider.build_request(&CompletionRequest::json("p"))).unwrap();

        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["content"], "p");
        assert_eq!(value["model"], DEFAULT_MODEL);

        let value =
            serde_json::to_value(provider.build_request(&CompletionRequest::text("p"))).unwrap();
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = OpenRouterConfig::builder().build();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_builder_custom_values() {
        let config = OpenRouterConfig::builder()
            .model("openai/gpt-4o")
            .temperature(0.3)
            .max_tokens(4096)
            .timeout_secs(20)
            .base_url("https://proxy.local/v1/chat/completions")
            .build();

        assert_eq!(config.model, "openai/gpt-4o");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.timeout_secs, 20);
        assert_eq!(config.base_url, "https://proxy.local/v1/chat/completions");
    }

    #[test]
    fn test_provider_name_and_model() {
        let provider = OpenRouterProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "OpenRouter");
        assert_eq!(provider.model(), Some(DEFAULT_MODEL));
    }
}
