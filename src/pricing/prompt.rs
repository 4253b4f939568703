//! Named prompt templates with `{{{placeholder}}}` substitution.
//!
//! Substitution is verbatim and single-pass: a value that itself contains
//! `{{{...}}}` is copied through untouched. Unknown placeholders render as
//! empty strings.

use crate::types::PricingMode;

const OPEN: &str = "{{{";
const CLOSE: &str = "}}}";

/// A prompt ready to send to a pricing model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// Name of the template it was rendered from.
    pub name: String,
    pub system: String,
    pub user: String,
}

#[derive(Debug)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: &'static str,
    pub body: &'static str,
}

pub static BUDGET_ANCHORED: PromptTemplate = PromptTemplate {
    name: "errand_price_recommendation",
    system: "You are an expert in pricing errands in {{{region}}}. \
             You answer with a recommended price range in {{{currency}}} and short, \
             practical advice that helps the customer get the best price.",
    body: "Analyze the errand below and recommend a fair, competitive price range in {{{currency}}}, \
together with intelligent prompts that help the customer get the best price.

Task Type: {{{taskType}}}
Pickup Location: {{{pickupLocation}}}
Drop-off Location: {{{dropoffLocation}}}
Notes: {{{notes}}}
Budget Estimate: {{{budgetEstimate}}}

Consider distance (work it out from the coordinates when a location is given as \"latitude, longitude\"), \
time of day, typical traffic and effort for {{{region}}}, and any special requirements in the notes. \
Weigh the customer's budget estimate, but do not simply repeat it when the errand is worth more or less. \
Also generate helpful prompts the customer can use to negotiate an even better price. \
Return the price range as a string such as \"{{{currencyCode}}} 500 - {{{currencyCode}}} 700\", \
and the prompts as a string.",
};

pub static MARKET_RATE: PromptTemplate = PromptTemplate {
    name: "errand_market_rate",
    system: "You are an expert in pricing errands in {{{region}}}. \
             You answer with the independent market rate in {{{currency}}} and short, \
             practical advice that helps the customer get the best price.",
    body: "Analyze the errand below and estimate the going market rate in {{{currency}}}, \
together with intelligent prompts that help the customer get the best price.

Task Type: {{{taskType}}}
Pickup Location: {{{pickupLocation}}}
Drop-off Location: {{{dropoffLocation}}}
Notes: {{{notes}}}
Dispatcher Name: {{{dispatcherName}}}
Dispatcher Phone: {{{dispatcherPhone}}}

Consider distance (work it out from the coordinates when a location is given as \"latitude, longitude\"), \
time of day, typical traffic and effort for {{{region}}}, and any special requirements in the notes. \
Ignore any budget the customer may have in mind and return an independent market rate for this errand. \
Also generate helpful prompts the customer can use to negotiate an even better price. \
Return the price range as a string such as \"{{{currencyCode}}} 500 - {{{currencyCode}}} 700\", \
and the prompts as a string.",
};

impl PromptTemplate {
    pub fn for_mode(mode: PricingMode) -> &'static PromptTemplate {
        match mode {
            PricingMode::BudgetAnchored => &BUDGET_ANCHORED,
            PricingMode::MarketRate => &MARKET_RATE,
        }
    }

    /// Render both the system and user parts.
    pub fn render(&self, vars: &[(&str, &str)]) -> RenderedPrompt {
        RenderedPrompt {
            name: self.name.to_string(),
            system: substitute(self.system, vars),
            user: substitute(self.body, vars),
        }
    }

    /// Placeholder names used by the body, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.body;
        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let Some(end) = after.find(CLOSE) else { break };
            let name = after[..end].trim();
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + CLOSE.len()..];
        }
        names
    }
}

/// Replace every `{{{name}}}` in `template` with its value.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        match after.find(CLOSE) {
            Some(end) => {
                let key = after[..end].trim();
                if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
                    out.push_str(value);
                }
                rest = &after[end + CLOSE.len()..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
