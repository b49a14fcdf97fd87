//! Client router: selects the LLM client for a request.
//!
//! Agents name a provider in their configuration; the router maps that name
//! to a registered client and falls back to the default one.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::llm::{Completion, LlmClient, LlmRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::simulated::SimulatedClient;

/// Routes LLM requests to the correct client.
pub struct ClientRouter {
    clients: HashMap<String, Arc<dyn LlmClient>>,
    default_client: String,
}

impl ClientRouter {
    /// Create a new router with a default client name.
    pub fn new(default_client: impl Into<String>) -> Self {
        Self {
            clients: HashMap::new(),
            default_client: default_client.into(),
        }
    }

    /// Register a client.
    pub fn register(&mut self, name: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.clients.insert(name.into(), client);
    }

    /// Get the default client.
    pub fn default_client(&self) -> Option<Arc<dyn LlmClient>> {
        self.clients.get(&self.default_client).cloned()
    }

    /// Get a specific client by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmClient>> {
        self.clients.get(name).cloned()
    }

    /// The client a request goes to: its named provider if registered,
    /// otherwise the default.
    pub fn route(&self, request: &LlmRequest) -> Option<Arc<dyn LlmClient>> {
        match request.provider.as_deref().filter(|p| !p.is_empty()) {
            Some(name) => self.get(name).or_else(|| {
                warn!(provider = %name, "Unknown provider, using default client");
                self.default_client()
            }),
            None => self.default_client(),
        }
    }

    /// List all registered client names (sorted).
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl LlmClient for ClientRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn complete(&self, request: LlmRequest) -> std::result::Result<Completion, ProviderError> {
        let client = self.route(&request).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no client registered for '{}'",
                request.provider.as_deref().unwrap_or(&self.default_client)
            ))
        })?;
        debug!(client = %client.name(), model = %request.model, "Routing request");
        client.complete(request).await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        match self.default_client() {
            Some(client) => client.health_check().await,
            None => Ok(false),
        }
    }
}

/// Build the router from configuration.
///
/// Only offline clients exist, so every configured provider name resolves to
/// the simulated client; an unknown default is reported and replaced.
pub fn build_from_config(config: &parley_config::AppConfig) -> ClientRouter {
    let simulated: Arc<dyn LlmClient> = Arc::new(SimulatedClient::new());

    let default_name = if config.default_provider == simulated.name() {
        config.default_provider.clone()
    } else {
        warn!(
            provider = %config.default_provider,
            "No client available for default provider, using simulated"
        );
        simulated.name().to_string()
    };

    let mut router = ClientRouter::new(default_name);
    router.register(simulated.name().to_string(), simulated);
    router
}
