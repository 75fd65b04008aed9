//! Client construction per target model.

use std::sync::Arc;

use crate::llm::client::LlmClient;
use crate::llm::openai::OpenAIClient;

/// Produces a client for an agent's target model id.
pub trait LlmClientFactory: Send + Sync {
    fn client_for(&self, model: &str) -> Arc<dyn LlmClient>;
}

/// Factory for OpenAI-compatible endpoints (OpenRouter by default).
pub struct OpenAIClientFactory {
    api_key: String,
    base_url: Option<String>,
}

impl OpenAIClientFactory {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

impl LlmClientFactory for OpenAIClientFactory {
    fn client_for(&self, model: &str) -> Arc<dyn LlmClient> {
        let mut client = OpenAIClient::new(self.api_key.clone()).with_model(model);
        if let Some(url) = &self.base_url {
            client = client.with_base_url(url.clone());
        }
        Arc::new(client)
    }
}

/// Hands out one pre-built client regardless of model; used in tests and
/// single-provider deployments.
pub struct FixedClientFactory {
    client: Arc<dyn LlmClient>,
}

impl FixedClientFactory {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

impl LlmClientFactory for FixedClientFactory {
    fn client_for(&self, _model: &str) -> Arc<dyn LlmClient> {
        self.client.clone()
    }
}
