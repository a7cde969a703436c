// respira-core/src/providers/openai.rs
use super::{Provider, function_tools, post_json};
use crate::config::ModelConfig;
use crate::models::chat::{ApiResponse, ChatMessage, Choice};
use crate::models::tools::{ToolCall, ToolDefinition};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAIProvider {
    config: ModelConfig,
    http_client: Client,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: ModelConfig, http_client: Client, api_key: String) -> Self {
        Self {
            config,
            http_client,
            api_key,
        }
    }

    /// Every `tool_call_id` sent must be answered by a `tool` message, so calls
    /// the agent skipped (unknown tools) are left out of the assistant message.
    fn message_to_wire(message: &ChatMessage, answered: &HashSet<&str>) -> Value {
        match message {
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let (sent, skipped): (Vec<&ToolCall>, Vec<&ToolCall>) = tool_calls
                    .iter()
                    .partition(|call| answered.contains(call.id.as_str()));
                if !skipped.is_empty() {
                    debug!(
                        tool_calls = ?skipped.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                        "Leaving unanswered tool calls out of the request."
                    );
                }
                if sent.is_empty() {
                    return json!({
                        "role": "assistant",
                        "content": content.as_deref().unwrap_or_default(),
                    });
                }
                json!({
                    "role": "assistant",
                    "content": content,
                    "tool_calls": sent
                        .iter()
                        .map(|call| json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": arguments_string(call),
                            }
                        }))
                        .collect::<Vec<_>>(),
                })
            }
            ChatMessage::Tool {
                tool_call_id,
                content,
                ..
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            }),
            other => json!({ "role": other.role(), "content": other.text() }),
        }
    }

    fn build_payload(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Value> {
        let answered: HashSet<&str> = messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        let mut payload = json!({
            "model": self.config.model_name,
            "messages": messages
                .iter()
                .map(|m| Self::message_to_wire(m, &answered))
                .collect::<Vec<_>>(),
        });
        if let Some(tools) = function_tools(tools) {
            payload["tools"] = tools;
            payload["tool_choice"] = json!("auto");
        }

        if let Some(params) = &self.config.parameters {
            let table = params
                .as_table()
                .ok_or_else(|| anyhow!("Model parameters must be a table"))?;
            for (key, value) in table {
                let value = serde_json::to_value(value)
                    .with_context(|| format!("Failed to convert parameter '{}' to JSON", key))?;
                trace!(key = %key, "Added parameter to OpenAI payload.");
                payload[key.as_str()] = value;
            }
        }
        Ok(payload)
    }

    fn parse_response(&self, response_body: &str) -> Result<ApiResponse> {
        let raw: Value = serde_json::from_str(response_body).with_context(|| {
            format!(
                "Failed to parse successful OpenAI-compatible API response JSON: {}",
                response_body
            )
        })?;

        let raw_choices = raw
            .get("choices")
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("No choices in OpenAI-compatible response: {}", response_body))?;

        let choices = raw_choices
            .iter()
            .enumerate()
            .map(|(index, choice)| {
                let message = &choice["message"];
                let content = message
                    .get("content")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let tool_calls = message
                    .get("tool_calls")
                    .and_then(Value::as_array)
                    .map(|calls| {
                        calls
                            .iter()
                            .filter_map(|call| {
                                let function = call.get("function")?;
                                let name = function.get("name").and_then(Value::as_str)?;
                                let Some(id) = call.get("id").and_then(Value::as_str) else {
                                    warn!(tool_name = %name, "Tool call without id, skipping.");
                                    return None;
                                };
                                let arguments = function.get("arguments").cloned().unwrap_or(Value::Null);
                                Some(ToolCall::new(id, name, arguments))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Choice {
                    index: index as u32,
                    message: ChatMessage::Assistant {
                        content,
                        tool_calls,
                    },
                    finish_reason: choice
                        .get("finish_reason")
                        .and_then(Value::as_str)
                        .unwrap_or("stop")
                        .to_string(),
                }
            })
            .collect();

        Ok(ApiResponse {
            id: raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            choices,
        })
    }
}

/// This protocol carries arguments as a JSON-encoded string.
fn arguments_string(call: &ToolCall) -> String {
    match &call.arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.model_name
    }

    async fn get_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse> {
        let endpoint = self.config.endpoint.as_deref().unwrap_or_else(|| {
            warn!("No endpoint specified for OpenAI provider model {}, using default: {}", self.config.model_name, DEFAULT_OPENAI_ENDPOINT);
            DEFAULT_OPENAI_ENDPOINT
        });

        if self.api_key.is_empty() {
            warn!(
                "API key is empty for OpenAI provider model {}. The API call will likely fail.",
                self.config.model_name
            );
        }

        let payload = self.build_payload(messages, tools)?;
        let body = post_json(&self.http_client, endpoint, Some(&self.api_key), &payload).await?;
        self.parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolId;
    use httpmock::prelude::*;

    fn provider(endpoint: Option<String>) -> OpenAIProvider {
        OpenAIProvider::new(
            ModelConfig {
                model_name: "gpt-4o-mini".to_string(),
                parameters: None,
                endpoint,
            },
            Client::new(),
            "sk-test".to_string(),
        )
    }

    #[test]
    fn tool_call_arguments_are_sent_as_strings() {
        let messages = vec![
            ChatMessage::user("top cities?"),
            ChatMessage::Assistant {
                content: None,
                tool_calls: vec![ToolCall::new("c1", "get_top_cities", json!({ "n": 3 }))],
            },
            ChatMessage::Tool {
                tool_call_id: "c1".to_string(),
                name: "get_top_cities".to_string(),
                content: "[]".to_string(),
            },
        ];
        let payload = provider(None).build_payload(&messages, None).unwrap();
        assert_eq!(
            payload["messages"][1]["tool_calls"][0]["function"]["arguments"],
            r#"{"n":3}"#
        );
        assert_eq!(payload["messages"][2]["tool_call_id"], "c1");
        assert!(payload.get("tools").is_none());
    }

    #[test]
    fn skipped_tool_calls_are_not_sent() {
        let messages = vec![
            ChatMessage::user("Oldest?"),
            ChatMessage::Assistant {
                content: None,
                tool_calls: vec![
                    ToolCall::new("c1", "get_weather", json!({})),
                    ToolCall::new("c2", "get_max_age", json!({})),
                ],
            },
            ChatMessage::Tool {
                tool_call_id: "c2".to_string(),
                name: "get_max_age".to_string(),
                content: "91".to_string(),
            },
        ];
        let payload = provider(None).build_payload(&messages, None).unwrap();
        let calls = payload["messages"][1]["tool_calls"].as_array().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["id"], "c2");
        assert_eq!(payload["messages"][2]["tool_call_id"], "c2");
    }

    #[test]
    fn assistant_with_only_skipped_calls_is_sent_as_text() {
        let messages = vec![
            ChatMessage::user("Weather?"),
            ChatMessage::Assistant {
                content: None,
                tool_calls: vec![ToolCall::new("c1", "get_weather", json!({}))],
            },
        ];
        let payload = provider(None).build_payload(&messages, None).unwrap();
        let assistant = &payload["messages"][1];
        assert!(assistant.get("tool_calls").is_none());
        assert_eq!(assistant["content"], "");
    }

    #[test]
    fn parses_string_arguments() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": { "name": "avg_cost", "arguments": "{\"city\":\"Pelotas\",\"year\":2021}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })
        .to_string();
        let response = provider(None).parse_response(&body).unwrap();
        assert_eq!(response.id, "chatcmpl-1");
        let call = &response.choices[0].message.tool_calls()[0];
        assert_eq!(call.id, "call_abc");
        let input = call.decode_arguments();
        assert_eq!(input.get("city"), Some(&json!("Pelotas")));
        assert_eq!(response.choices[0].finish_reason, "tool_calls");
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .body_contains("list_datasets");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-2",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": "Two tables are loaded." },
                        "finish_reason": "stop"
                    }]
                }));
            })
            .await;

        let definitions = vec![ToolId::ListDatasets.definition()];
        let response = provider(Some(server.url("/v1/chat/completions")))
            .get_completion(&[ChatMessage::user("What data do you have?")], Some(&definitions))
            .await
            .unwrap();

        mock.assert_hits_async(1).await;
        assert_eq!(response.choices[0].message.text(), "Two tables are loaded.");
    }
}
