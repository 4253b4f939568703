//! Request validation.
//!
//! Turns a raw form submission into a `PricingRequest`. Location strings
//! are accepted as free text or "latitude, longitude" pairs without
//! parsing; the pricing model interprets them.

use crate::types::{PriceAnchor, PricingError, PricingMode, PricingRequest, RawErrand, ValidationErrors};

/// Categories offered by the request form. Not enforced by the validator.
pub const TASK_TYPES: &[&str] = &[
    "Grocery shopping",
    "Picking up parcels",
    "Dropping off laundry",
    "Paying bills",
    "Queueing service",
    "Other",
];

const MIN_LOCATION_CHARS: usize = 3;
const MIN_DISPATCHER_NAME_CHARS: usize = 2;
const MIN_DISPATCHER_PHONE_CHARS: usize = 10;

/// Validates raw errands for one pricing mode.
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    mode: PricingMode,
}

impl RequestValidator {
    pub fn new(mode: PricingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PricingMode {
        self.mode
    }

    /// Validate every field and collect all failures.
    pub fn validate(&self, raw: &RawErrand) -> Result<PricingRequest, PricingError> {
        let mut errors = ValidationErrors::new();

        let task_type = trimmed(&raw.task_type);
        if task_type.is_empty() {
            errors.push("taskType", "Please select a task type.");
        }

        let pickup_location = trimmed(&raw.pickup_location);
        if char_len(pickup_location) < MIN_LOCATION_CHARS {
            errors.push("pickupLocation", "Pickup location must be at least 3 characters.");
        }

        let dropoff_location = trimmed(&raw.dropoff_location);
        if char_len(dropoff_location) < MIN_LOCATION_CHARS {
            errors.push("dropoffLocation", "Drop-off location must be at least 3 characters.");
        }

        let notes = Some(trimmed(&raw.notes))
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let anchor = match self.mode {
            PricingMode::BudgetAnchored => {
                let budget = trimmed(&raw.budget_estimate);
                if budget.is_empty() {
                    errors.push("budgetEstimate", "Please provide a budget estimate.");
                }
                PriceAnchor::Budget {
                    budget_estimate: budget.to_string(),
                }
            }
            // Any budget on the raw errand is dropped here.
            PricingMode::MarketRate => {
                let name = trimmed(&raw.dispatcher_name);
                if char_len(name) < MIN_DISPATCHER_NAME_CHARS {
                    errors.push("dispatcherName", "Name must be at least 2 characters.");
                }
                let phone = trimmed(&raw.dispatcher_phone);
                if char_len(phone) < MIN_DISPATCHER_PHONE_CHARS {
                    errors.push("dispatcherPhone", "Phone number must be at least 10 characters.");
                }
                PriceAnchor::Contact {
                    dispatcher_name: name.to_string(),
                    dispatcher_phone: phone.to_string(),
                }
            }
        };

        if !errors.is_empty() {
            return Err(PricingError::Validation(errors));
        }

        Ok(PricingRequest {
            task_type: task_type.to_string(),
            pickup_location: pickup_location.to_string(),
            dropoff_location: dropoff_location.to_string(),
            notes,
            anchor,
        })
    }
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
