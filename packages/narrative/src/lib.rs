#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM-backed interpretation text.
//!
//! [`LlmNarrator`] adapts an [`providers::LlmProvider`] (Anthropic Claude,
//! `OpenAI`, or any `OpenAI`-compatible server via `AI_BASE_URL`) to the
//! engine's [`TextGenerator`] seam. The service bounds every call with a
//! timeout and falls back to its template on any error, so nothing here
//! retries.

pub mod prompt;
pub mod providers;

use async_trait::async_trait;
use risk_index_engine::{InterpretationError, InterpretationRequest, TextGenerator};
use thiserror::Error;

use crate::providers::LlmProvider;

/// Errors that can occur while generating narrative text.
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

impl From<NarrativeError> for InterpretationError {
    fn from(e: NarrativeError) -> Self {
        Self::Generation {
            message: e.to_string(),
        }
    }
}

/// [`TextGenerator`] that asks an LLM for a short interpretation.
pub struct LlmNarrator {
    provider: Box<dyn LlmProvider>,
}

impl LlmNarrator {
    #[must_use]
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Builds a narrator from the provider environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError::Config`] if no provider is configured.
    pub fn from_env() -> Result<Self, NarrativeError> {
        Ok(Self::new(providers::create_provider_from_env()?))
    }
}

#[async_trait]
impl TextGenerator for LlmNarrator {
    async fn generate(
        &self,
        request: &InterpretationRequest,
    ) -> Result<String, InterpretationError> {
        let user_prompt = prompt::user_prompt(request).map_err(NarrativeError::from)?;
        let text = self
            .provider
            .complete(prompt::SYSTEM_PROMPT, &user_prompt)
            .await?;
        log::debug!("{}: generated {} chars", request.family_id, text.len());
        Ok(text)
    }
}
