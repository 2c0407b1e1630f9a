//! LLM provider abstraction and implementations.
//!
//! Supports Anthropic Claude and `OpenAI` (including `OpenAI`-compatible
//! servers) via a common trait.

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;

use crate::NarrativeError;

/// Upper bound on generated tokens. Interpretations are a short paragraph.
pub const MAX_TOKENS: u32 = 400;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends one system + user prompt pair and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError`] if the request fails or the reply has no
    /// text.
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, NarrativeError>;
}

/// Creates an LLM provider based on environment variables.
///
/// If `AI_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 2. `OPENAI_API_KEY` or `AI_BASE_URL` set -> `OpenAI`-compatible
///
/// `AI_MODEL` overrides the provider's default model.
///
/// # Errors
///
/// Returns [`NarrativeError::Config`] if no credentials are found or the
/// explicitly requested provider is not configured.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, NarrativeError> {
    let provider = match std::env::var("AI_PROVIDER") {
        Ok(provider) => provider,
        Err(_) => detect_provider()?,
    };

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| NarrativeError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = std::env::var("AI_MODEL")
                .unwrap_or_else(|_| anthropic::DEFAULT_MODEL.to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(api_key, model)))
        }
        "openai" | "gpt" => {
            let base_url = std::env::var("AI_BASE_URL").ok();
            let api_key = match std::env::var("OPENAI_API_KEY") {
                Ok(key) => key,
                // Self-hosted servers generally ignore the key.
                Err(_) if base_url.is_some() => String::new(),
                Err(_) => {
                    return Err(NarrativeError::Config {
                        message: "OPENAI_API_KEY environment variable not set".to_string(),
                    });
                }
            };
            let model =
                std::env::var("AI_MODEL").unwrap_or_else(|_| openai::DEFAULT_MODEL.to_string());
            let provider = openai::OpenAiProvider::new(api_key, model);
            Ok(Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            }))
        }
        other => Err(NarrativeError::Config {
            message: format!("Unknown AI provider: {other}. Use 'anthropic' or 'openai'."),
        }),
    }
}

/// Picks a provider from the credentials present in the environment.
fn detect_provider() -> Result<String, NarrativeError> {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
        return Ok("anthropic".to_string());
    }

    if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("AI_BASE_URL").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI-compatible");
        return Ok("openai".to_string());
    }

    Err(NarrativeError::Config {
        message: "No AI credentials detected. Set ANTHROPIC_API_KEY, OPENAI_API_KEY or \
                  AI_BASE_URL, or set AI_PROVIDER explicitly."
            .to_string(),
    })
}
