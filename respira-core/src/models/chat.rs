// respira-core/src/models/chat.rs
use super::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// A message in the conversation sent to/from the AI.
///
/// Each role carries only the fields that are valid for it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            ChatMessage::System { .. } => "system",
            ChatMessage::User { .. } => "user",
            ChatMessage::Assistant { .. } => "assistant",
            ChatMessage::Tool { .. } => "tool",
        }
    }

    /// Text content of the message, empty for assistant messages that only carry tool calls.
    pub fn text(&self) -> &str {
        match self {
            ChatMessage::System { content }
            | ChatMessage::User { content }
            | ChatMessage::Tool { content, .. } => content,
            ChatMessage::Assistant { content, .. } => content.as_deref().unwrap_or_default(),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            ChatMessage::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Append-only, chronologically ordered message history of one turn.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Starts a conversation with system instructions and the user's prompt.
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Appends an assistant message; tool and system messages are rejected.
    pub fn push_assistant(&mut self, message: ChatMessage) -> Result<(), String> {
        match message {
            ChatMessage::Assistant { .. } => {
                self.messages.push(message);
                Ok(())
            }
            other => Err(format!(
                "expected an assistant message, got a '{}' message",
                other.role()
            )),
        }
    }

    /// Appends a tool result.
    ///
    /// The most recent non-tool message must be the assistant message that
    /// requested `tool_call_id`.
    pub fn push_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), String> {
        let tool_call_id = tool_call_id.into();
        let requester = self
            .messages
            .iter()
            .rev()
            .find(|m| !matches!(m, ChatMessage::Tool { .. }));
        match requester {
            Some(ChatMessage::Assistant { tool_calls, .. })
                if tool_calls.iter().any(|c| c.id == tool_call_id) =>
            {
                self.messages.push(ChatMessage::Tool {
                    tool_call_id,
                    name: name.into(),
                    content: content.into(),
                });
                Ok(())
            }
            _ => Err(format!(
                "tool result '{}' does not follow the assistant message that requested it",
                tool_call_id
            )),
        }
    }
}

/// Represents one of the choices returned by the AI API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Provider-independent shape of a chat completion response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assistant_requesting(ids: &[&str]) -> ChatMessage {
        ChatMessage::Assistant {
            content: None,
            tool_calls: ids
                .iter()
                .map(|id| ToolCall::new(*id, "get_max_age", json!({})))
                .collect(),
        }
    }

    #[test]
    fn messages_serialize_with_role_tag() {
        let value = serde_json::to_value(ChatMessage::user("Hi")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "Hi" }));

        let value = serde_json::to_value(ChatMessage::assistant("Hello")).unwrap();
        assert_eq!(value, json!({ "role": "assistant", "content": "Hello" }));
    }

    #[test]
    fn conversation_starts_with_system_and_user() {
        let conversation = Conversation::new("sys", "question");
        let roles: Vec<&str> = conversation.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["system", "user"]);
    }

    #[test]
    fn tool_results_must_follow_their_request() {
        let mut conversation = Conversation::new("sys", "question");
        assert!(conversation.push_tool_result("c1", "get_max_age", "90").is_err());

        conversation.push_assistant(assistant_requesting(&["c1", "c2"])).unwrap();
        conversation.push_tool_result("c1", "get_max_age", "90").unwrap();
        conversation.push_tool_result("c2", "get_max_age", "90").unwrap();
        assert!(conversation.push_tool_result("c3", "get_max_age", "90").is_err());
        assert_eq!(conversation.len(), 5);
    }

    #[test]
    fn push_assistant_rejects_other_roles() {
        let mut conversation = Conversation::new("sys", "question");
        assert!(conversation.push_assistant(ChatMessage::user("nope")).is_err());
        assert_eq!(conversation.len(), 2);
    }
}
