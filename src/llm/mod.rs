//! Pricing model integration.
//!
//! Defines the `PricingModel` trait and provides implementations for
//! OpenAI-compatible chat completions (OpenAI, OpenRouter) and the
//! Anthropic Messages API.

pub mod anthropic;
pub mod openai;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::pricing::prompt::RenderedPrompt;
use crate::pricing::schema::OutputSchema;
use crate::types::PricingError;

use anthropic::AnthropicClient;
use openai::OpenAiCompatibleClient;

/// Abstraction over hosted pricing models.
///
/// Implementors make exactly one request per call and return the model's
/// raw text. Transport failures map to `PricingError::UpstreamUnavailable`;
/// judging the text is the gateway's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        schema: &OutputSchema,
    ) -> Result<String, PricingError>;
}

/// Which wire protocol a model endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    OpenRouter,
    Anthropic,
}

impl ModelProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => openai::OPENAI_BASE_URL,
            ModelProvider::OpenRouter => openai::OPENROUTER_BASE_URL,
            ModelProvider::Anthropic => anthropic::ANTHROPIC_BASE_URL,
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelProvider::OpenAi => write!(f, "openai"),
            ModelProvider::OpenRouter => write!(f, "openrouter"),
            ModelProvider::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "openrouter" => Ok(ModelProvider::OpenRouter),
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            other => Err(format!("Unknown model provider: {other}")),
        }
    }
}

/// Connection descriptor for the pricing model.
#[derive(Debug)]
pub struct ModelEndpoint {
    pub provider: ModelProvider,
    /// Overrides the provider's default base URL.
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: SecretString,
    pub max_tokens: u32,
    /// Transport timeout; `None` waits for the provider.
    pub timeout: Option<Duration>,
}

impl ModelEndpoint {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Build the client for an endpoint.
pub fn build_model(endpoint: ModelEndpoint) -> Result<Arc<dyn PricingModel>> {
    let provider = endpoint.provider;
    let model: Arc<dyn PricingModel> = match provider {
        ModelProvider::OpenAi | ModelProvider::OpenRouter => Arc::new(
            OpenAiCompatibleClient::new(endpoint)
                .with_context(|| format!("Failed to build {provider} pricing model"))?,
        ),
        ModelProvider::Anthropic => Arc::new(
            AnthropicClient::new(endpoint).context("Failed to build Anthropic pricing model")?,
        ),
    };
    Ok(model)
}

/// Sent with every model request.
pub(crate) const USER_AGENT: &str = concat!("errand-pricer/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client, with a timeout only when one is configured.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().context("Failed to build HTTP client")
}

/// Classify a transport-level reqwest failure.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> PricingError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    PricingError::UpstreamUnavailable(format!("{provider} {kind}: {err}"))
}

/// Keep error bodies short enough to log and surface.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...[truncated]")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
