//! Anthropic Claude integration.
//!
//! Implements `PricingModel` over the Anthropic Messages API. The output
//! schema travels in the system prompt; the reply text blocks are joined
//! and handed back unjudged.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{http_client, transport_error, truncate, ModelEndpoint, PricingModel};
use crate::pricing::prompt::RenderedPrompt;
use crate::pricing::schema::OutputSchema;
use crate::types::PricingError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MAX_ERROR_BODY_CHARS: usize = 300;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl MessagesResponse {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|b| b.content_type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    http: Client,
    url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(endpoint: ModelEndpoint) -> Result<Self> {
        let http = http_client(endpoint.timeout)?;
        let url = format!("{}/v1/messages", endpoint.base_url().trim_end_matches('/'));

        Ok(Self {
            http,
            url,
            api_key: endpoint.api_key,
            model: endpoint.model,
            max_tokens: endpoint.max_tokens,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl PricingModel for AnthropicClient {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        _schema: &OutputSchema,
    ) -> Result<String, PricingError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &prompt.system,
            messages: vec![Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        debug!(model = %self.model, template = %prompt.name, "Sending Anthropic message");

        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Anthropic API returned an error status");
            return Err(PricingError::UpstreamUnavailable(format!(
                "anthropic API error {status} (model={}): {}",
                self.model,
                truncate(&error_text, MAX_ERROR_BODY_CHARS)
            )));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            PricingError::UpstreamUnavailable(format!("Unreadable anthropic response: {e}"))
        })?;

        if let Some(usage) = &body.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?body.stop_reason,
                "Anthropic usage"
            );
        }

        Ok(body.text())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
