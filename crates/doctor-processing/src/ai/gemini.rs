//! Google Gemini AI provider implementation.
//!
//! This module provides the [`GeminiProvider`] which implements the [`AIProvider`]
//! trait for Google's Gemini API (<https://ai.google.dev/>).
//!
//! JSON requests set `responseMimeType: application/json`, which makes the
//! model answer with a bare JSON document instead of fenced markdown.

use std::time::Duration;

use super::http::{request_failure, status_failure};
use super::{AIProvider, CompletionRequest};
use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default Gemini API endpoint.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

/// Default model used for diagnosis.
const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default temperature for model responses (low for deterministic outputs).
const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default max tokens for responses. Diagnoses carry a full code unit.
const DEFAULT_MAX_TOKENS: u32 = 8192;

const JSON_MIME_TYPE: &str = "application/json";

// Gemini API request structures
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

// Gemini API response structures
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// The model to use (e.g., "gemini-2.5-pro", "gemini-2.5-flash").
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

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl GeminiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GeminiConfigBuilder {
        GeminiConfigBuilder::default()
    }
}

/// Builder for [`GeminiConfig`].
#[derive(Default)]
pub struct GeminiConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl GeminiConfigBuilder {
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
    pub fn build(self) -> GeminiConfig {
        GeminiConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
        }
    }
}

/// Google Gemini AI provider.
///
/// # Example
///
/// ```rust,ignore
/// use doctor_processing::ai::{GeminiProvider, GeminiConfig};
///
/// // Simple usage with defaults
/// let provider = GeminiProvider::new("your-api-key")?;
///
/// // With custom configuration
/// let config = GeminiConfig::builder()
///     .model("gemini-2.5-flash")
///     .timeout_secs(30)
///     .build();
/// let provider = GeminiProvider::with_config("your-api-key", config)?;
/// ```
pub struct GeminiProvider {
    api_key: String,
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, GeminiConfig::default())
    }

    /// Create a new Gemini provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: GeminiConfig) -> Result<Self> {
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

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
                response_mime_type: request.json_output.then_some(JSON_MIME_TYPE),
            },
        }
    }

    fn call_api(&self, request: &GeminiRequest) -> Result<String> {
        // {base_url}{model}:generateContent, key sent as a header so it never
        // shows up in error messages that echo the URL
        let url = format!(
            "{}{}:generateContent",
            self.config.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
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
        extract_text(&body)
    }
}

/// Concatenate the text parts of the first candidate.
///
/// Gemini may return no candidates, a candidate without content, or a
/// candidate blocked by safety filters; all of those are errors.
fn extract_text(body: &str) -> Result<String> {
    let result: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| anyhow!("Unexpected Gemini response shape: {}", e))?;

    let candidate = result
        .candidates
        .as_ref()
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| anyhow!("No response content from Gemini API"))?;

    if let Some(reason) = &candidate.finish_reason
        && (reason == "SAFETY" || reason == "BLOCKED" || reason == "PROHIBITED_CONTENT")
    {
        return Err(anyhow!("Gemini blocked the response (finishReason: {})", reason));
    }

    let text: String = candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.as_ref())
        .map(|parts| parts.iter().map(|p| p.text.as_str()).collect())
        .ok_or_else(|| anyhow!("No response content from Gemini API"))?;

    Ok(text)
}

impl AIProvider for GeminiProvider {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);
        self.call_api(&body)
    }

    fn name(&self) -> &str {
        "Gemini"
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

    // -------------------------------------------------------------------------
    // Response parsing tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_text_valid_response() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "{\"diagnosis_summary\": \"ok\"}"}]
                },
                "finishReason": "STOP"
            }]
        }"#;

        assert_eq!(extract_text(json).unwrap(), r#"{"diagnosis_summary": "ok"}"#);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "{\"a\": "},
                        {"text": "1}"}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;

        assert_eq!(extract_text(json).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_text_empty_or_null_candidates() {
        assert!(extract_text(r#"{"candidates": []}"#).is_err());
        assert!(extract_text(r#"{"candidates": null}"#).is_err());
        assert!(extract_text(r#"{}"#).is_err());
    }

    #[test]
    fn test_extract_text_missing_content() {
        let json = r#"{"candidates": [{"content": null, "finishReason": "STOP"}]}"#;
        assert!(extract_text(json).is_err());

        let json = r#"{"candidates": [{"content": {"parts": null}, "finishReason": "STOP"}]}"#;
        assert!(extract_text(json).is_err());
    }

    #[test]
    fn test_extract_text_safety_blocked() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "x"}]}, "finishReason": "SAFETY"}]}"#;
        let err = extract_text(json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_text_malformed_json() {
        assert!(extract_text(r#"{"candidates": "not an array"}"#).is_err());
        assert!(extract_text("<html>502 Bad Gateway</html>").is_err());
    }

    // -------------------------------------------------------------------------
    // Request building tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_json_request_sets_mime_type() {
        let provider = GeminiProvider::new("test-key").unwrap();
        let body = provider.build_request(&CompletionRequest::json("profile"));
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["generationConfig"]["responseMimeType"], JSON_MIME_TYPE);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "profile");
        assert_eq!(value["contents"][0]["role"], "user");
    }

    #[test]
    fn test_text_request_omits_mime_type() {
        let provider = GeminiProvider::new("test-key").unwrap();
        let body = provider.build_request(&CompletionRequest::text("hello"));
        let value = serde_json::to_value(&body).unwrap();

        assert!(value["generationConfig"].get("responseMimeType").is_none());
        assert_eq!(value["generationConfig"]["maxOutputTokens"], DEFAULT_MAX_TOKENS);
    }

    // -------------------------------------------------------------------------
    // Config builder tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_config_builder_defaults() {
        let config = GeminiConfig::builder().build();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_builder_custom_values() {
        let config = GeminiConfig::builder()
            .model("gemini-2.5-flash")
            .temperature(0.5)
            .max_tokens(2000)
            .timeout_secs(15)
            .base_url("https://custom.api.com/")
            .build();

        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.base_url, "https://custom.api.com/");
    }

    // -------------------------------------------------------------------------
    // Provider trait implementation tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_provider_name_and_model() {
        let provider = GeminiProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "Gemini");
        assert_eq!(provider.model(), Some(DEFAULT_MODEL));

        let config = GeminiConfig::builder().model("custom-model").build();
        let provider = GeminiProvider::with_config("test-key", config).unwrap();
        assert_eq!(provider.model(), Some("custom-model"));
    }

    #[test]
    fn test_unreachable_endpoint_is_transient() {
        // Nothing listens on port 9 on loopback; the connect fails immediately
        let config = GeminiConfig::builder()
            .base_url("http://127.0.0.1:9/")
            .timeout_secs(2)
            .build();
        let provider = GeminiProvider::with_config("test-key", config).unwrap();

        let err = provider.complete(&CompletionRequest::json("x")).unwrap_err();
        assert!(crate::ai::is_transient(&err), "{err:#}");
    }
}
