//! OpenAI-compatible chat completions integration.
//!
//! Serves OpenAI itself and OpenRouter (or any gateway speaking the same
//! format). The output schema is sent as a strict `json_schema`
//! response format as well as in the system prompt.

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

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const MAX_ERROR_BODY_CHARS: usize = 300;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

impl ResponseFormat {
    fn from_schema(schema: &OutputSchema) -> Self {
        Self {
            format_type: "json_schema",
            json_schema: JsonSchemaFormat {
                name: schema.name.to_string(),
                strict: true,
                schema: schema.json_schema(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiCompatibleClient {
    http: Client,
    url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    provider: String,
}

impl OpenAiCompatibleClient {
    pub fn new(endpoint: ModelEndpoint) -> Result<Self> {
        let http = http_client(endpoint.timeout)?;
        let url = format!("{}/chat/completions", endpoint.base_url().trim_end_matches('/'));

        Ok(Self {
            http,
            url,
            provider: endpoint.provider.to_string(),
            api_key: endpoint.api_key,
            model: endpoint.model,
            max_tokens: endpoint.max_tokens,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PricingModel for OpenAiCompatibleClient {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        schema: &OutputSchema,
    ) -> Result<String, PricingError> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            response_format: ResponseFormat::from_schema(schema),
        };

        debug!(provider = %self.provider, model = %self.model, template = %prompt.name, "Sending chat completion");

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.provider, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(provider = %self.provider, status = %status, error = %error_text, "Pricing model returned an error status");
            return Err(PricingError::UpstreamUnavailable(format!(
                "{} API error {status} (model={}): {}",
                self.provider,
                self.model,
                truncate(&error_text, MAX_ERROR_BODY_CHARS)
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            PricingError::UpstreamUnavailable(format!("Unreadable {} response: {e}", self.provider))
        })?;

        if let Some(usage) = &body.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion usage"
            );
        }

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
