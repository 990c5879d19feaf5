//! AI provider trait for abstracting LLM interactions.
//!
//! This module defines the [`AIProvider`] trait that lets the diagnosis
//! client talk to any text-completion backend (Gemini, OpenRouter, a test
//! double, ...) without changing the diagnosis logic.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `ollama.rs`)
//! 2. Implement the [`AIProvider`] trait for your provider struct
//! 3. Wrap failures worth retrying in [`TransientError`]
//! 4. Export the provider in `src/ai/mod.rs`
//!
//! # Example
//!
//! ```rust,ignore
//! use doctor_processing::ai::{AIProvider, CompletionRequest, GeminiProvider};
//!
//! let provider = GeminiProvider::new("your-api-key")?;
//! let text = provider.complete(&CompletionRequest::json("Describe this profile ..."))?;
//! ```

use anyhow::Result;

/// One prompt sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Ask the backend for a JSON-only answer when it supports it.
    pub json_output: bool,
}

impl CompletionRequest {
    /// A plain-text completion request.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            json_output: false,
        }
    }

    /// A completion request asking for structured JSON output.
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            json_output: true,
        }
    }
}

/// Trait for text-completion backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one provider can serve
/// concurrent requests.
///
/// # Error Handling
///
/// Implementations return meaningful errors via `anyhow::Result`. Failures
/// that may succeed on a later attempt (timeouts, connection errors, rate
/// limits, server errors) should be wrapped in [`TransientError`] so callers
/// can retry them; every other error is treated as final.
pub trait AIProvider: Send + Sync {
    /// Send the prompt and return the model's raw text answer.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Get the provider name for logging and debugging.
    fn name(&self) -> &str;

    /// Get the model being used by this provider.
    ///
    /// Returns `None` if the provider doesn't expose model information.
    fn model(&self) -> Option<&str> {
        None
    }
}

/// Marks a provider failure as worth retrying.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransientError {
    pub message: String,
}

impl TransientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Whether `err` (or anything in its chain) is a [`TransientError`].
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<TransientError>())
}

/// HTTP status codes that are worth retrying: rate limits and server errors.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
