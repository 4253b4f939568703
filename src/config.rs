//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved once at startup into `SecretString`s; nothing downstream reads
//! the environment.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use crate::llm::{ModelEndpoint, ModelProvider};
use crate::pricing::route_map::StaticMapOptions;
use crate::pricing::GatewayConfig;
use crate::storage::DEFAULT_DATABASE_URL;
use crate::types::PricingMode;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub maps: MapsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "errand-pricer".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PricingConfig {
    pub mode: PricingMode,
    pub region: String,
    pub currency: String,
    pub currency_code: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let defaults = GatewayConfig::new(PricingMode::BudgetAnchored);
        Self {
            mode: defaults.pricing_mode,
            region: defaults.region,
            currency: defaults.currency,
            currency_code: defaults.currency_code,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `openai`, `openrouter` or `anthropic`.
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 0 disables the transport timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MapsConfig {
    /// Route previews are off unless this names a set variable.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(flatten)]
    pub style: StaticMapOptions,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration")
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The pricing model endpoint, with its key resolved.
    pub fn model_endpoint(&self) -> Result<ModelEndpoint> {
        let provider: ModelProvider = self
            .llm
            .provider
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid [llm] provider")?;
        let api_key = Self::resolve_env(&self.llm.api_key_env)?;

        Ok(ModelEndpoint {
            provider,
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            api_key: SecretString::new(api_key),
            max_tokens: self.llm.max_tokens,
            timeout: (self.llm.timeout_secs > 0).then(|| Duration::from_secs(self.llm.timeout_secs)),
        })
    }

    /// Gateway settings. A maps key variable that is named but unset is an
    /// error; leaving it out disables route previews.
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let map_provider_api_key = match &self.maps.api_key_env {
            Some(env_name) => Some(SecretString::new(Self::resolve_env(env_name)?)),
            None => None,
        };

        Ok(GatewayConfig {
            pricing_mode: self.pricing.mode,
            map_provider_api_key,
            region: self.pricing.region.clone(),
            currency: self.pricing.currency.clone(),
            currency_code: self.pricing.currency_code.clone(),
            map: self.maps.style.clone(),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.service.host, self.service.port)
            .parse()
            .with_context(|| {
                format!("Invalid bind address {}:{}", self.service.host, self.service.port)
            })
    }
}
