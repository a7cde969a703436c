// respira-core/src/providers/mod.rs
use crate::config::{AgentConfig, ProviderInstanceConfig};
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, trace, warn};

pub mod ollama;
pub mod openai;

/// A chat model endpoint.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn get_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse>;
    fn name(&self) -> &str;
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new(default_provider: String) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
        }
    }

    /// Builds every provider declared in `config`, sharing one HTTP client
    /// bounded by the configured request timeout.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client for providers")?;
        Self::with_client(config, http_client)
    }

    pub fn with_client(config: &AgentConfig, http_client: Client) -> Result<Self> {
        let mut registry = Self::new(config.default_provider.clone());
        for (id, provider_conf) in &config.providers {
            let provider = build_provider(id, provider_conf, http_client.clone())?;
            registry.register(id.clone(), provider);
        }
        Ok(registry)
    }

    pub fn register(&mut self, id: String, provider: Arc<dyn Provider>) {
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Provider not found: {}", id))
    }

    pub fn default(&self) -> Result<Arc<dyn Provider>> {
        self.get(&self.default_provider)
    }

    pub fn default_provider_id(&self) -> &str {
        &self.default_provider
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn build_provider(
    id: &str,
    provider_conf: &ProviderInstanceConfig,
    http_client: Client,
) -> Result<Arc<dyn Provider>> {
    let api_key = if provider_conf.api_key_env_var.is_empty() {
        String::new()
    } else {
        match std::env::var(&provider_conf.api_key_env_var) {
            Ok(key) => key,
            Err(e) => {
                warn!(provider_id = %id, env_var = %provider_conf.api_key_env_var, error = %e, "API key environment variable not set or invalid");
                String::new()
            }
        }
    };
    let model_config = provider_conf.model_config.clone();
    let provider: Arc<dyn Provider> = match provider_conf.provider_type.as_str() {
        "ollama" => Arc::new(ollama::OllamaProvider::new(model_config, http_client)),
        "openai" => Arc::new(openai::OpenAIProvider::new(model_config, http_client, api_key)),
        other => return Err(anyhow!("Unsupported provider type: {}", other)),
    };
    Ok(provider)
}

/// Wire form of a tool definition shared by Ollama and OpenAI.
pub(crate) fn function_tools(tools: Option<&[ToolDefinition]>) -> Option<Value> {
    let tools = tools.filter(|t| !t.is_empty())?;
    Some(json!(
        tools
            .iter()
            .map(|t| json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            }))
            .collect::<Vec<_>>()
    ))
}

/// POSTs a JSON payload and returns the body of a 2xx response.
pub(crate) async fn post_json(
    http_client: &Client,
    endpoint: &str,
    api_key: Option<&str>,
    payload: &Value,
) -> Result<String> {
    if tracing::enabled!(tracing::Level::TRACE) {
        trace!(endpoint = %endpoint, payload = %payload, "Full request payload");
    }

    let mut request = http_client
        .post(endpoint)
        .header(header::CONTENT_TYPE, "application/json")
        .json(payload);
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("HTTP request execution failed for endpoint: {}", endpoint))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read API response text")?;
    trace!(status = %status, response_body = %body, "Received API response");

    if !status.is_success() {
        error!(status = %status, response_body = %body, "API request failed");
        return Err(anyhow!(
            "API request failed with status {}. Endpoint: {}. Response: {}",
            status,
            endpoint,
            body
        ));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn registry_builds_default_ollama_provider() {
        let config = AgentConfig::default();
        let registry = ProviderRegistry::with_client(&config, Client::new()).unwrap();
        assert_eq!(registry.default_provider_id(), "ollama");
        let provider = registry.default().unwrap();
        assert_eq!(provider.name(), "llama3.2");
        assert!(registry.get("missing").is_err());
    }

    #[test]
    fn function_tools_skips_empty_lists() {
        assert!(function_tools(None).is_none());
        assert!(function_tools(Some(&[])).is_none());
    }
}
