// respira-core/src/lib.rs

#![doc = include_str!("../../README.md")]

pub mod agent;
pub mod analytics;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod providers;
pub mod tools;
pub mod utils;


pub mod models {
    pub mod chat;
    pub mod tools;
}

pub use agent::{Agent, TurnOutcome};
pub use analytics::Analytics;
pub use config::{AgentConfig, ModelConfig};
pub use dataset::Dataset;
pub use errors::{AgentError, DatasetError, ToolError};
pub use models::chat::{ApiResponse, ChatMessage, Choice, Conversation};
pub use models::tools::{
    ToolCall, ToolDefinition, ToolInput, ToolParameter, ToolParameterType,
    ToolParametersDefinition,
};
pub use tools::{AnalyticsToolbox, ToolId, ToolRegistry};

pub use async_trait::async_trait;

/// Trait defining the interface for providing tools to the [`Agent`].
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Returns the definitions of all tools available.
    fn get_tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Executes the tool with the given name.
    ///
    /// Returns `None` when no such tool is available; tool failures are
    /// reported as `Some(Err(..))`.
    async fn execute_tool(
        &self,
        tool_name: &str,
        input: ToolInput,
    ) -> Option<Result<serde_json::Value, ToolError>>;
}

/// Details the execution result of a single tool call within a [`TurnOutcome`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolExecutionResult {
    /// The unique ID associated with the AI's request to call this tool.
    pub tool_call_id: String,
    /// The name of the tool that was executed.
    pub tool_name: String,
    /// The decoded input arguments.
    pub input: serde_json::Value,
    /// JSON text handed back to the model.
    pub output: String,
    pub status: ToolExecutionStatus,
}

/// Indicates whether a tool execution succeeded or failed.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum ToolExecutionStatus {
    Success,
    Failure,
}
