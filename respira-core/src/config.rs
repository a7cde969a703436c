// respira-core/src/config.rs

//! Handles configuration structures and parsing for the agent library.

use crate::dataset::TextEncoding;
use crate::tools::ToolId;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PROVIDER_ID: &str = "ollama";
pub const DEFAULT_MODEL_NAME: &str = "llama3.2";
pub const DEFAULT_ADMISSIONS_PATH: &str = "data/raw/dados_sus3.csv";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly public-health assistant that answers questions about \
hospital admissions recorded by the public health system. Use the available tools to look up numbers instead of \
guessing. When a tool returns JSON, do not echo the raw JSON: explain the result in plain language, lead with the \
direct answer and add brief context. If a tool reports an error, tell the user what was wrong with the request. \
Reply in the language the user wrote in.";

#[derive(Deserialize, Debug, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_provider_id")]
    pub default_provider: String,
    /// Upper bound for a single model call; expiry fails the current turn.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub providers: HashMap<String, ProviderInstanceConfig>,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProviderInstanceConfig {
    // Use `type` in TOML, map to `provider_type`
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub api_key_env_var: String,
    pub model_config: ModelConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default)]
    pub parameters: Option<toml::Value>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ModelConfig {
    pub fn temperature(&self) -> Option<f64> {
        self.parameters
            .as_ref()
            .and_then(|p| p.get("temperature"))
            .and_then(|t| t.as_float().or_else(|| t.as_integer().map(|i| i as f64)))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatasetConfig {
    #[serde(default = "default_admissions_path")]
    pub admissions: PathBuf,
    #[serde(default)]
    pub auxiliary: Vec<TableConfig>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            admissions: default_admissions_path(),
            auxiliary: Vec::new(),
        }
    }
}

/// An additional CSV table loaded next to the admissions file.
#[derive(Deserialize, Debug, Clone)]
pub struct TableConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub encoding: TextEncoding,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ToolsConfig {
    /// Wire names of the tools to advertise; all tools when absent.
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_admissions_path() -> PathBuf {
    PathBuf::from(DEFAULT_ADMISSIONS_PATH)
}

fn default_delimiter() -> char {
    ','
}

fn default_ollama_provider() -> ProviderInstanceConfig {
    let mut parameters = toml::value::Table::new();
    parameters.insert("temperature".to_string(), toml::Value::Float(0.0));
    ProviderInstanceConfig {
        provider_type: "ollama".to_string(),
        api_key_env_var: String::new(),
        model_config: ModelConfig {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            parameters: Some(toml::Value::Table(parameters)),
            endpoint: None,
        },
    }
}

impl Default for AgentConfig {
    /// Local Ollama running `llama3.2` at temperature 0 over the default dataset path.
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(DEFAULT_PROVIDER_ID.to_string(), default_ollama_provider());
        Self {
            system_prompt: default_system_prompt(),
            default_provider: default_provider_id(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            providers,
            dataset: DatasetConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<AgentConfig> {
        let mut config: AgentConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        if config.providers.is_empty() && config.default_provider == DEFAULT_PROVIDER_ID {
            config
                .providers
                .insert(DEFAULT_PROVIDER_ID.to_string(), default_ollama_provider());
        }

        config.validate()?;
        tracing::info!("Successfully parsed and validated agent configuration.");
        Ok(config)
    }

    /// Reads, parses and validates a config file; relative dataset paths are
    /// resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<AgentConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // --- Basic Checks ---
        if self.system_prompt.trim().is_empty() {
            return Err(anyhow!("'system_prompt' in config content is empty."));
        }
        if self.default_provider.trim().is_empty() {
            return Err(anyhow!("'default_provider' key in config content is empty."));
        }
        if !self.providers.contains_key(&self.default_provider) {
            return Err(anyhow!(
                "Default provider '{}' not found in [providers] map.",
                self.default_provider
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("'request_timeout_secs' must be greater than zero."));
        }

        // --- Provider Validation ---
        for (key, provider) in &self.providers {
            match provider.provider_type.as_str() {
                "ollama" => {}
                "openai" => {
                    if provider.api_key_env_var.trim().is_empty() {
                        return Err(anyhow!("Provider '{}' is missing 'api_key_env_var'.", key));
                    }
                }
                "" => return Err(anyhow!("Provider '{}' is missing 'type'.", key)),
                other => {
                    return Err(anyhow!(
                        "Provider '{}' has unsupported type '{}' (expected 'ollama' or 'openai').",
                        key,
                        other
                    ));
                }
            }
            if provider.model_config.model_name.trim().is_empty() {
                return Err(anyhow!("Provider '{}' is missing 'model_config.model_name'.", key));
            }
            if let Some(endpoint) = &provider.model_config.endpoint {
                if endpoint.trim().is_empty() {
                    return Err(anyhow!("Provider '{}' has an empty 'model_config.endpoint'.", key));
                }
                Url::parse(endpoint).with_context(|| {
                    format!("Invalid URL format for endpoint ('{}') in provider '{}'.", endpoint, key)
                })?;
            }
            if let Some(params) = &provider.model_config.parameters {
                if !params.is_table() {
                    return Err(anyhow!(
                        "Provider '{}' has invalid 'model_config.parameters'. Expected a TOML table.",
                        key
                    ));
                }
            }
        }

        // --- Dataset Validation ---
        if self.dataset.admissions.as_os_str().is_empty() {
            return Err(anyhow!("'dataset.admissions' path is empty."));
        }
        for table in &self.dataset.auxiliary {
            if table.name.trim().is_empty() {
                return Err(anyhow!("An auxiliary dataset is missing 'name'."));
            }
            if !table.delimiter.is_ascii() {
                return Err(anyhow!(
                    "Auxiliary dataset '{}' has a non-ASCII delimiter '{}'.",
                    table.name,
                    table.delimiter
                ));
            }
        }

        self.enabled_tools()?;
        Ok(())
    }

    /// Tools to register, in declaration order of [`ToolId`] when unrestricted.
    pub fn enabled_tools(&self) -> Result<Vec<ToolId>> {
        match &self.tools.enabled {
            None => Ok(ToolId::ALL.to_vec()),
            Some(names) => names
                .iter()
                .map(|name| {
                    ToolId::from_str(name)
                        .map_err(|_| anyhow!("Unknown tool '{}' in [tools] enabled list.", name))
                })
                .collect(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Makes relative dataset paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.dataset.admissions.is_relative() {
            self.dataset.admissions = base.join(&self.dataset.admissions);
        }
        for table in &mut self.dataset.auxiliary {
            if table.path.is_relative() {
                table.path = base.join(&table.path);
            }
        }
    }
}
