//! Output schema for the pricing model and validation of its replies.
//!
//! The model's reply is never trusted until every declared field has been
//! found as a non-empty string.

use serde_json::{json, Map, Value};

use crate::types::PricingError;

pub const RECOMMENDED_PRICE_RANGE: &str = "recommendedPriceRange";
pub const INTELLIGENT_PROMPTS: &str = "intelligentPrompts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    /// Steers the model; sent with the schema.
    pub description: String,
}

/// Ordered set of named string fields the model must return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub fields: Vec<SchemaField>,
}

/// Field values that passed validation, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOutput {
    values: Vec<(&'static str, String)>,
}

impl ValidatedOutput {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        let idx = self.values.iter().position(|(k, _)| *k == name)?;
        Some(self.values.remove(idx).1)
    }
}

impl OutputSchema {
    /// The price-range + coaching schema.
    pub fn price_recommendation(currency: &str) -> Self {
        Self {
            name: "errand_price_recommendation",
            fields: vec![
                SchemaField {
                    name: RECOMMENDED_PRICE_RANGE,
                    description: format!(
                        "The recommended price range for the errand in {currency}, as a single string."
                    ),
                },
                SchemaField {
                    name: INTELLIGENT_PROMPTS,
                    description: "Intelligent prompts to help the customer get the best price."
                        .to_string(),
                },
            ],
        }
    }

    /// JSON Schema for providers with native structured output.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.to_string(),
                json!({ "type": "string", "description": field.description }),
            );
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Plain-text form of the schema, appended to the system prompt.
    pub fn instructions(&self) -> String {
        let mut text = String::from(
            "Respond with a single JSON object and nothing else. \
             It must contain exactly these string fields:\n",
        );
        for field in &self.fields {
            text.push_str(&format!("- \"{}\": {}\n", field.name, field.description));
        }
        text
    }

    /// Check a raw model reply against the schema.
    pub fn validate(&self, raw: &str) -> Result<ValidatedOutput, PricingError> {
        let text = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
        if text.is_empty() {
            return Err(PricingError::estimation("empty model response"));
        }

        let object = extract_json_object(text)
            .ok_or_else(|| PricingError::estimation("no JSON object in model response"))?;

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match object.get(field.name) {
                Some(Value::String(s)) if !s.trim().is_empty() => {
                    values.push((field.name, s.trim().to_string()));
                }
                Some(Value::String(_)) => {
                    return Err(PricingError::estimation(format!("field {} is empty", field.name)));
                }
                Some(other) => {
                    return Err(PricingError::estimation(format!(
                        "field {} is not a string: {other}",
                        field.name
                    )));
                }
                None => {
                    return Err(PricingError::estimation(format!("field {} is missing", field.name)));
                }
            }
        }

        Ok(ValidatedOutput { values })
    }
}

/// Find a JSON object in model text: bare, embedded in prose, or fenced.
///
/// Each `{` is tried as a start in turn, so a brace in the prose before the
/// object does not hide it.
fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }

    text.match_indices('{').find_map(|(i, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
