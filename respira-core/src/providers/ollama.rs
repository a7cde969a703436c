// respira-core/src/providers/ollama.rs
use super::{Provider, function_tools, post_json};
use crate::config::ModelConfig;
use crate::models::chat::{ApiResponse, ChatMessage, Choice};
use crate::models::tools::{ToolCall, ToolDefinition};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434/api/chat";

#[derive(Clone)]
pub struct OllamaProvider {
    config: ModelConfig,
    http_client: Client,
}

impl OllamaProvider {
    pub fn new(config: ModelConfig, http_client: Client) -> Self {
        debug!("Creating new Ollama provider with model: {}", config.model_name);
        Self {
            config,
            http_client,
        }
    }

    fn message_to_wire(message: &ChatMessage) -> Value {
        match message {
            ChatMessage::System { content } => json!({ "role": "system", "content": content }),
            ChatMessage::User { content } => json!({ "role": "user", "content": content }),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut wire = json!({
                    "role": "assistant",
                    "content": content.as_deref().unwrap_or_default(),
                });
                if !tool_calls.is_empty() {
                    wire["tool_calls"] = json!(
                        tool_calls
                            .iter()
                            .map(|call| json!({
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments_object(),
                                }
                            }))
                            .collect::<Vec<_>>()
                    );
                }
                wire
            }
            ChatMessage::Tool { name, content, .. } => json!({
                "role": "tool",
                "tool_name": name,
                "content": content,
            }),
        }
    }

    fn build_payload(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Value> {
        debug!(model = %self.config.model_name, message_count = messages.len(), tools_present = tools.is_some(), "Building Ollama payload");

        let mut payload = json!({
            "model": self.config.model_name,
            "messages": messages.iter().map(Self::message_to_wire).collect::<Vec<_>>(),
            "stream": false,
        });

        if let Some(tools) = function_tools(tools) {
            payload["tools"] = tools;
        }

        // Sampling parameters go under `options` for Ollama.
        if let Some(params) = &self.config.parameters {
            let table = params
                .as_table()
                .ok_or_else(|| anyhow!("Model parameters must be a table"))?;
            let mut options = Map::new();
            for (key, value) in table {
                let value = serde_json::to_value(value)
                    .with_context(|| format!("Failed to convert parameter '{}' to JSON", key))?;
                options.insert(key.clone(), value);
            }
            if !options.is_empty() {
                payload["options"] = Value::Object(options);
            }
        }

        Ok(payload)
    }

    fn parse_response(&self, response_body: &str) -> Result<ApiResponse> {
        let raw_response: Value = serde_json::from_str(response_body)
            .with_context(|| format!("Failed to parse Ollama response JSON: {}", response_body))?;

        let message = raw_response
            .get("message")
            .ok_or_else(|| anyhow!("Missing message in Ollama response: {}", response_body))?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let tool_calls: Vec<ToolCall> = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let function = call.get("function")?;
                        let Some(name) = function.get("name").and_then(Value::as_str) else {
                            warn!(call = %call, "Ollama tool call without a function name, skipping.");
                            return None;
                        };
                        // Ollama does not assign ids to tool calls.
                        let id = call
                            .get("id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                        let arguments = function.get("arguments").cloned().unwrap_or(Value::Null);
                        Some(ToolCall::new(id, name, arguments))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = raw_response
            .get("done_reason")
            .and_then(Value::as_str)
            .unwrap_or("stop")
            .to_string();

        let result = ApiResponse {
            id: raw_response
                .get("model")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::Assistant {
                    content,
                    tool_calls,
                },
                finish_reason,
            }],
        };

        debug!("Parsed response: {:?}", result);
        Ok(result)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        &self.config.model_name
    }

    async fn get_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
        debug!("Using Ollama endpoint: {}", endpoint);

        let payload = self.build_payload(messages, tools)?;
        let body = post_json(&self.http_client, endpoint, None, &payload)
            .await
            .context("Failed to get a response from Ollama")?;
        self.parse_response(&body)
    }
}
