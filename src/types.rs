//! Shared types for the errand pricing service.
//!
//! These types form the data model used across all modules: the raw
//! inbound errand, the validated request, the model's validated result,
//! and the error taxonomy every caller has to classify.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Inbound errand
// ---------------------------------------------------------------------------

/// Raw, unvalidated errand description as submitted by a form.
///
/// Every field is optional here; the validator decides what is required
/// for the active pricing mode. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawErrand {
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub dropoff_location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub budget_estimate: Option<String>,
    #[serde(default)]
    pub dispatcher_name: Option<String>,
    #[serde(default)]
    pub dispatcher_phone: Option<String>,
}

// ---------------------------------------------------------------------------
// Pricing mode
// ---------------------------------------------------------------------------

/// How the requester's own price expectations feed into the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingMode {
    /// The requester supplies a budget the model may weigh.
    BudgetAnchored,
    /// The requester supplies contact details; the model ignores any budget.
    MarketRate,
}

impl PricingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingMode::BudgetAnchored => "budget-anchored",
            PricingMode::MarketRate => "market-rate",
        }
    }
}

impl fmt::Display for PricingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "budget-anchored" | "budget" => Ok(PricingMode::BudgetAnchored),
            "market-rate" | "market" => Ok(PricingMode::MarketRate),
            other => Err(format!("Unknown pricing mode: {other}")),
        }
    }
}

/// The mode-specific field set carried by a validated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PriceAnchor {
    #[serde(rename_all = "camelCase")]
    Budget { budget_estimate: String },
    #[serde(rename_all = "camelCase")]
    Contact {
        dispatcher_name: String,
        dispatcher_phone: String,
    },
}

// ---------------------------------------------------------------------------
// Validated request
// ---------------------------------------------------------------------------

/// A validated errand, ready to be priced.
///
/// Only the validator constructs these, so every string is trimmed and
/// meets its length rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRequest {
    pub(crate) task_type: String,
    pub(crate) pickup_location: String,
    pub(crate) dropoff_location: String,
    pub(crate) notes: Option<String>,
    pub(crate) anchor: PriceAnchor,
}

impl PricingRequest {
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn pickup_location(&self) -> &str {
        &self.pickup_location
    }

    pub fn dropoff_location(&self) -> &str {
        &self.dropoff_location
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn anchor(&self) -> &PriceAnchor {
        &self.anchor
    }

    /// Budget text, present only for budget-anchored requests.
    pub fn budget_estimate(&self) -> Option<&str> {
        match &self.anchor {
            PriceAnchor::Budget { budget_estimate } => Some(budget_estimate),
            PriceAnchor::Contact { .. } => None,
        }
    }

    /// Dispatcher (name, phone), present only for market-rate requests.
    pub fn dispatcher(&self) -> Option<(&str, &str)> {
        match &self.anchor {
            PriceAnchor::Contact {
                dispatcher_name,
                dispatcher_phone,
            } => Some((dispatcher_name, dispatcher_phone)),
            PriceAnchor::Budget { .. } => None,
        }
    }

    pub fn mode(&self) -> PricingMode {
        match self.anchor {
            PriceAnchor::Budget { .. } => PricingMode::BudgetAnchored,
            PriceAnchor::Contact { .. } => PricingMode::MarketRate,
        }
    }
}

impl fmt::Display for PricingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} → {} ({})",
            self.task_type,
            self.pickup_location,
            self.dropoff_location,
            self.mode(),
        )
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// A schema-validated price estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    /// Currency-labelled range, e.g. "Ksh 500 - Ksh 700".
    pub recommended_price_range: String,
    /// Negotiation coaching for the requester.
    pub intelligent_prompts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
}

impl PricingResult {
    /// Best-effort numeric reading of `recommended_price_range`.
    pub fn parsed_price_range(&self) -> Option<PriceRange> {
        PriceRange::parse(&self.recommended_price_range)
    }
}

/// Numeric low/high reading of a free-text price range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub currency: Option<String>,
    pub low: Decimal,
    pub high: Decimal,
}

impl PriceRange {
    /// Parse the first two amounts in `text` ("Ksh 500 - Ksh 700",
    /// "KES 1,200–1,500"). A single amount yields `low == high`.
    pub fn parse(text: &str) -> Option<Self> {
        let amounts = extract_amounts(text);
        let first = amounts.first()?;
        let second = amounts.get(1).unwrap_or(first);

        let currency = currency_before(&text[..first.start])
            .or_else(|| currency_after(&text[second.end..]));

        Some(PriceRange {
            currency,
            low: first.value.min(second.value),
            high: first.value.max(second.value),
        })
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(c) => write!(f, "{c} {} - {c} {}", self.low, self.high),
            None => write!(f, "{} - {}", self.low, self.high),
        }
    }
}

struct Amount {
    start: usize,
    end: usize,
    value: Decimal,
}

/// Find digit runs, allowing `,` and `.` between digits.
fn extract_amounts(text: &str) -> Vec<Amount> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut amounts = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].1.is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        let mut digits = String::new();
        let mut j = i;
        while j < chars.len() {
            let c = chars[j].1;
            let digit_follows = chars
                .get(j + 1)
                .map(|(_, n)| n.is_ascii_digit())
                .unwrap_or(false);
            if c.is_ascii_digit() {
                digits.push(c);
            } else if c == '.' && digit_follows {
                digits.push(c);
            } else if c != ',' || !digit_follows {
                break;
            }
            j += 1;
        }

        let end = chars.get(j).map(|(idx, _)| *idx).unwrap_or(text.len());
        if let Ok(value) = Decimal::from_str(&digits) {
            amounts.push(Amount { start, end, value });
        }
        i = j;
    }

    amounts
}

fn is_currency_char(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '$' | '€' | '£')
}

fn currency_before(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_end();
    let label: String = trimmed
        .chars()
        .rev()
        .take_while(|c| is_currency_char(*c))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    (!label.is_empty()).then_some(label)
}

fn currency_after(suffix: &str) -> Option<String> {
    let label: String = suffix
        .trim_start()
        .chars()
        .take_while(|c| is_currency_char(*c))
        .collect();
    (!label.is_empty()).then_some(label)
}

// ---------------------------------------------------------------------------
// Persistence records
// ---------------------------------------------------------------------------

/// Lifecycle of a stored errand request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in-progress",
            RequestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(RequestStatus::Pending),
            "in-progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            other => Err(format!("Unknown request status: {other}")),
        }
    }
}

/// A persisted errand request as listed in the admin view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrandRecord {
    pub id: String,
    pub task_type: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub notes: Option<String>,
    pub budget_estimate: Option<String>,
    pub dispatcher_name: Option<String>,
    pub dispatcher_phone: Option<String>,
    pub recommended_price_range: Option<String>,
    pub intelligent_prompts: Option<String>,
    pub map_url: Option<String>,
    pub status: RequestStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// User-facing text for a model reply that failed the output schema.
pub const ESTIMATION_FAILED_MESSAGE: &str = "could not generate a price recommendation";

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors found in one raw errand, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The error for a given field, if that field was rejected.
    pub fn field(&self, name: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Failures of the validate → price pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid errand: {0}")]
    Validation(ValidationErrors),

    #[error("Pricing model unavailable: {0}")]
    UpstreamUnavailable(String),

    /// `reason` is for logs; the display text is the fixed user message.
    #[error("could not generate a price recommendation")]
    Estimation { reason: String },
}

impl PricingError {
    pub fn estimation(reason: impl Into<String>) -> Self {
        PricingError::Estimation {
            reason: reason.into(),
        }
    }
}

/// Failures writing to or reading from the request store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error(
        "Database permission error: the request store refused to save this errand. \
         Check the configured credentials and the write policies on the `requests` table ({detail})."
    )]
    PermissionDenied { detail: String },

    #[error("Failed to save the errand request: {0}")]
    Store(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
