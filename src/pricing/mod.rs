//! Price estimation gateway.
//!
//! Renders a validated errand into the mode's prompt, sends it to the
//! pricing model under the output schema, validates the reply and merges
//! in the optional route-preview URL. One model call per estimate; no
//! retries, no caching and no fabricated fallback price.

pub mod prompt;
pub mod route_map;
pub mod schema;

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::PricingModel;
use crate::types::{PriceAnchor, PricingError, PricingMode, PricingRequest, PricingResult, RawErrand, ValidationErrors};
use crate::validator::RequestValidator;
use prompt::{PromptTemplate, RenderedPrompt};
use route_map::{StaticMapBuilder, StaticMapOptions};
use schema::{OutputSchema, INTELLIGENT_PROMPTS, RECOMMENDED_PRICE_RANGE};

/// Everything the gateway needs, passed in explicitly at construction.
pub struct GatewayConfig {
    pub pricing_mode: PricingMode,
    /// Route previews are derived only when a key is configured.
    pub map_provider_api_key: Option<SecretString>,
    pub region: String,
    /// Long currency name used in instructions, e.g. "Kenyan Shillings (Ksh)".
    pub currency: String,
    /// Short label used in the example range, e.g. "Ksh".
    pub currency_code: String,
    pub map: StaticMapOptions,
}

impl GatewayConfig {
    /// Kenyan defaults, no route preview.
    pub fn new(pricing_mode: PricingMode) -> Self {
        Self {
            pricing_mode,
            map_provider_api_key: None,
            region: "Kenya".to_string(),
            currency: "Kenyan Shillings (Ksh)".to_string(),
            currency_code: "Ksh".to_string(),
            map: StaticMapOptions::default(),
        }
    }

    pub fn with_map_key(mut self, key: SecretString) -> Self {
        self.map_provider_api_key = Some(key);
        self
    }
}

pub struct PriceEstimationGateway {
    model: Arc<dyn PricingModel>,
    validator: RequestValidator,
    template: &'static PromptTemplate,
    schema: OutputSchema,
    route_map: Option<StaticMapBuilder>,
    region: String,
    currency: String,
    currency_code: String,
}

impl PriceEstimationGateway {
    pub fn new(model: Arc<dyn PricingModel>, config: GatewayConfig) -> Result<Self> {
        let route_map = match config.map_provider_api_key {
            Some(key) => Some(StaticMapBuilder::new(config.map, key)?),
            None => None,
        };

        Ok(Self {
            model,
            validator: RequestValidator::new(config.pricing_mode),
            template: PromptTemplate::for_mode(config.pricing_mode),
            schema: OutputSchema::price_recommendation(&config.currency),
            route_map,
            region: config.region,
            currency: config.currency,
            currency_code: config.currency_code,
        })
    }

    pub fn mode(&self) -> PricingMode {
        self.validator.mode()
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn derives_route_preview(&self) -> bool {
        self.route_map.is_some()
    }

    /// The exact prompt an estimate for `request` would send.
    pub fn render(&self, request: &PricingRequest) -> RenderedPrompt {
        let mut vars: Vec<(&str, &str)> = vec![
            ("region", self.region.as_str()),
            ("currency", self.currency.as_str()),
            ("currencyCode", self.currency_code.as_str()),
            ("taskType", request.task_type()),
            ("pickupLocation", request.pickup_location()),
            ("dropoffLocation", request.dropoff_location()),
            ("notes", request.notes().unwrap_or("")),
        ];
        match request.anchor() {
            PriceAnchor::Budget { budget_estimate } => {
                vars.push(("budgetEstimate", budget_estimate.as_str()));
            }
            PriceAnchor::Contact {
                dispatcher_name,
                dispatcher_phone,
            } => {
                vars.push(("dispatcherName", dispatcher_name.as_str()));
                vars.push(("dispatcherPhone", dispatcher_phone.as_str()));
            }
        }

        let mut prompt = self.template.render(&vars);
        prompt.system.push_str("\n\n");
        prompt.system.push_str(&self.schema.instructions());
        prompt
    }

    /// Price one validated errand.
    pub async fn estimate(&self, request: &PricingRequest) -> Result<PricingResult, PricingError> {
        if request.mode() != self.mode() {
            return Err(PricingError::Validation(ValidationErrors::single(
                "pricingMode",
                format!(
                    "This service prices errands in {} mode, but the request was built for {}.",
                    self.mode(),
                    request.mode()
                ),
            )));
        }

        let prompt = self.render(request);
        debug!(
            template = %prompt.name,
            task_type = %request.task_type(),
            mode = %self.mode(),
            "Requesting price estimate"
        );

        let raw = self.model.generate(&prompt, &self.schema).await.map_err(|e| {
            warn!(error = %e, "Pricing model call failed");
            e
        })?;

        let mut output = self.schema.validate(&raw).map_err(|e| {
            if let PricingError::Estimation { reason } = &e {
                warn!(reason = %reason, "Model reply failed the output schema");
            }
            e
        })?;

        let recommended_price_range = output
            .take(RECOMMENDED_PRICE_RANGE)
            .ok_or_else(|| PricingError::estimation("recommendedPriceRange not validated"))?;
        let intelligent_prompts = output
            .take(INTELLIGENT_PROMPTS)
            .ok_or_else(|| PricingError::estimation("intelligentPrompts not validated"))?;

        let map_url = self
            .route_map
            .as_ref()
            .map(|b| b.build(request.pickup_location(), request.dropoff_location()));

        info!(
            task_type = %request.task_type(),
            price_range = %recommended_price_range,
            route_preview = map_url.is_some(),
            "Estimate complete"
        );

        Ok(PricingResult {
            recommended_price_range,
            intelligent_prompts,
            map_url,
        })
    }

    /// Validate a raw errand, then price it.
    pub async fn validate_and_estimate(
        &self,
        raw: &RawErrand,
    ) -> Result<(PricingRequest, PricingResult), PricingError> {
        let request = self.validator.validate(raw)?;
        let result = self.estimate(&request).await?;
        Ok((request, result))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
