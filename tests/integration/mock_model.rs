//! Mock pricing model for integration testing.
//!
//! Provides a deterministic `PricingModel` implementation that replays
//! scripted replies in order and records every prompt it was sent, with
//! no network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use errand_pricer::llm::PricingModel;
use errand_pricer::pricing::prompt::RenderedPrompt;
use errand_pricer::pricing::schema::OutputSchema;
use errand_pricer::types::PricingError;

/// One scripted model outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Down(String),
}

/// A scripted pricing model.
///
/// Once the script runs out, the last reply repeats.
#[derive(Clone)]
pub struct ScriptedModel {
    script: Arc<Mutex<VecDeque<Reply>>>,
    last: Arc<Mutex<Option<Reply>>>,
    prompts: Arc<Mutex<Vec<RenderedPrompt>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            last: Arc::new(Mutex::new(None)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answers with a well-formed recommendation.
    pub fn answering(range: &str, prompts: &str) -> Self {
        Self::new(vec![Reply::Text(recommendation(range, prompts))])
    }

    /// Always fails as if the provider were unreachable.
    pub fn unreachable() -> Self {
        Self::new(vec![Reply::Down("connection refused".into())])
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<RenderedPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

/// JSON text a conforming model would return.
pub fn recommendation(range: &str, prompts: &str) -> String {
    serde_json::json!({
        "recommendedPriceRange": range,
        "intelligentPrompts": prompts,
    })
    .to_string()
}

#[async_trait]
impl PricingModel for ScriptedModel {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        _schema: &OutputSchema,
    ) -> Result<String, PricingError> {
        self.prompts.lock().unwrap().push(prompt.clone());

        let next = self.script.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Reply::Down("script exhausted".into())),
        };

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Down(reason) => Err(PricingError::UpstreamUnavailable(reason)),
        }
    }
}
