//! AI module for LLM-backed dataset diagnosis.
//!
//! This module provides a trait-based abstraction for text-completion
//! backends, so the diagnosis client works with any LLM service.
//!
//! # Feature Flag
//!
//! The concrete HTTP providers require the `ai` feature flag. The
//! [`AIProvider`] trait is always available for custom implementations.
//!
//! ```toml
//! # Enable the HTTP providers (default)
//! doctor-processing = { version = "0.1", features = ["ai"] }
//!
//! # Bring your own provider, no HTTP client
//! doctor-processing = { version = "0.1", default-features = false }
//! ```
//!
//! # Providers
//!
//! - [`GeminiProvider`] - Google Gemini API (requires `ai` feature)
//! - [`OpenRouterProvider`] - OpenRouter API (requires `ai` feature)
//!
//! Failures worth retrying are wrapped in [`TransientError`]; the diagnosis
//! client checks for them with [`is_transient`].

// Provider trait is always available (for custom implementations)
mod provider;
pub use provider::{
    AIProvider, CompletionRequest, TransientError, is_retryable_status, is_transient,
};

// Concrete providers require the "ai" feature
#[cfg(feature = "ai")]
mod gemini;
#[cfg(feature = "ai")]
mod http;
#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use gemini::{GeminiConfig, GeminiConfigBuilder, GeminiProvider};

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
