// respira-core/src/models/tools.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::warn;

// --- Structs for AI Tool Interaction ---

/// Represents a tool call requested by the AI model.
///
/// `arguments` is kept as raw JSON: OpenAI-style APIs send a JSON-encoded
/// string, Ollama sends an object. [`ToolCall::decode_arguments`] normalizes both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: JsonValue,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// The argument object to echo back to APIs that expect one. Empty when
    /// the payload holds no object; unlike [`ToolCall::decode_arguments`]
    /// this logs nothing, since it runs every time a conversation is resent.
    pub fn arguments_object(&self) -> Map<String, JsonValue> {
        match &self.arguments {
            JsonValue::Object(map) => map.clone(),
            JsonValue::String(raw) => match serde_json::from_str::<JsonValue>(raw) {
                Ok(JsonValue::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }

    /// Decodes the argument payload into a [`ToolInput`].
    ///
    /// Never fails: a payload that is not a JSON object (or a string holding one)
    /// yields empty arguments and a warning.
    pub fn decode_arguments(&self) -> ToolInput {
        match &self.arguments {
            JsonValue::Object(map) => ToolInput::from_map(map.clone()),
            JsonValue::Null => ToolInput::default(),
            JsonValue::String(raw) if raw.trim().is_empty() => ToolInput::default(),
            JsonValue::String(raw) => match serde_json::from_str::<JsonValue>(raw) {
                Ok(JsonValue::Object(map)) => ToolInput::from_map(map),
                Ok(other) => {
                    warn!(tool_name = %self.name, tool_call_id = %self.id, decoded = %other, "Tool arguments decoded to a non-object value, using empty arguments.");
                    ToolInput::default()
                }
                Err(e) => {
                    warn!(tool_name = %self.name, tool_call_id = %self.id, error = %e, raw = %raw, "Could not parse arguments for tool, using empty arguments.");
                    ToolInput::default()
                }
            },
            other => {
                warn!(tool_name = %self.name, tool_call_id = %self.id, arguments = %other, "Unsupported tool argument payload, using empty arguments.");
                ToolInput::default()
            }
        }
    }
}

// --- Generic Structs for Tool Definition and Input ---

/// Defines the schema for a tool that can be presented to the AI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParametersDefinition,
}

/// Defines the parameters structure for a tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParametersDefinition {
    #[serde(rename = "type")]
    pub param_type: String,
    pub properties: BTreeMap<String, ToolParameter>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolParametersDefinition {
    /// An object schema without any properties.
    pub fn empty() -> Self {
        Self {
            param_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

/// Defines a single parameter within a tool's schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ToolParameter {
    pub fn new(param_type: ToolParameterType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            enum_values: None,
        }
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// Represents the type of a tool parameter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// Represents the input arguments provided for a tool execution at runtime.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ToolInput {
    pub arguments: BTreeMap<String, JsonValue>,
}

impl ToolInput {
    pub fn from_map(map: Map<String, JsonValue>) -> Self {
        Self {
            arguments: map.into_iter().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.arguments.get(key).filter(|v| !v.is_null())
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_object_arguments() {
        let call = ToolCall::new("c1", "get_top_cities", json!({ "n": 3 }));
        let input = call.decode_arguments();
        assert_eq!(input.get("n"), Some(&json!(3)));
    }

    #[test]
    fn decode_string_encoded_arguments() {
        let call = ToolCall::new("c1", "get_top_ages", json!(r#"{"n": "2", "mode": "both"}"#));
        let input = call.decode_arguments();
        assert_eq!(input.get("n"), Some(&json!("2")));
        assert_eq!(input.get("mode"), Some(&json!("both")));
    }

    #[test]
    fn malformed_arguments_become_empty() {
        let call = ToolCall::new("c1", "get_top_ages", json!("{not json"));
        assert!(call.decode_arguments().is_empty());

        let call = ToolCall::new("c2", "get_top_ages", json!("[1, 2]"));
        assert!(call.decode_arguments().is_empty());

        let call = ToolCall::new("c3", "get_top_ages", json!(42));
        assert!(call.decode_arguments().is_empty());
    }

    #[test]
    fn arguments_object_is_empty_for_malformed_payloads() {
        let call = ToolCall::new("c1", "get_top_ages", json!(r#"{"n": 2}"#));
        assert_eq!(call.arguments_object().get("n"), Some(&json!(2)));

        let call = ToolCall::new("c2", "get_top_ages", json!("{not json"));
        assert!(call.arguments_object().is_empty());

        let call = ToolCall::new("c3", "get_max_age", JsonValue::Null);
        assert!(call.arguments_object().is_empty());
    }

    #[test]
    fn null_values_are_treated_as_absent() {
        let input = ToolInput::from_map(json!({ "n": null }).as_object().cloned().unwrap());
        assert!(input.get("n").is_none());
    }

    #[test]
    fn parameter_schema_serializes_like_json_schema() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "mode".to_string(),
            ToolParameter::new(ToolParameterType::String, "Direction").with_enum(&["smallest", "largest"]),
        );
        let params = ToolParametersDefinition {
            param_type: "object".to_string(),
            properties,
            required: vec!["mode".to_string()],
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["mode"]["type"], "string");
        assert_eq!(value["properties"]["mode"]["enum"], json!(["smallest", "largest"]));
        assert_eq!(value["required"], json!(["mode"]));
    }
}
