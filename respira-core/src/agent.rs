// respira-core/src/agent.rs
use crate::errors::AgentError;
use crate::models::chat::{ChatMessage, Conversation};
use crate::models::tools::{ToolCall, ToolDefinition};
use crate::providers::Provider;
use crate::utils::{single_line, truncate_string};
use crate::{ToolExecutionResult, ToolExecutionStatus, ToolProvider};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Model calls per turn when tool calling is enabled: one to request tools,
/// one to narrate their results.
pub const MAX_MODEL_CALLS: usize = 2;

const LOG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    AwaitingModel,
    DispatchingTools,
    Done,
}

/// Everything produced by one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text of the last assistant message; may be empty.
    pub answer: String,
    pub conversation: Conversation,
    pub tool_results: Vec<ToolExecutionResult>,
    pub model_calls: usize,
}

pub struct Agent {
    system_prompt: String,
    provider: Arc<dyn Provider>,
    tool_provider: Arc<dyn ToolProvider>,
    request_timeout: Duration,
}

impl Agent {
    pub fn new(
        system_prompt: impl Into<String>,
        provider: Arc<dyn Provider>,
        tool_provider: Arc<dyn ToolProvider>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            provider,
            tool_provider,
            request_timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Answers one user prompt.
    ///
    /// With `use_tools` the model may request tools once; their results are
    /// appended and the model is asked exactly once more. Tool requests in
    /// that second response are not dispatched. Without `use_tools` the model
    /// is called once and no tools are advertised.
    pub async fn run_turn(&self, prompt: &str, use_tools: bool) -> Result<TurnOutcome, AgentError> {
        info!(use_tools, prompt = %truncate_string(&single_line(prompt), LOG_PREVIEW_CHARS), "Starting turn.");

        let mut conversation = Conversation::new(self.system_prompt.clone(), prompt);
        let definitions = use_tools.then(|| self.tool_provider.get_tool_definitions());
        let mut tool_results = Vec::new();
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut model_calls = 0;
        let mut answer = String::new();
        let mut state = TurnState::AwaitingModel;

        loop {
            trace!(?state, model_calls, "Turn state");
            match state {
                TurnState::AwaitingModel => {
                    let message = self
                        .call_model(conversation.messages(), definitions.as_deref())
                        .await?;
                    model_calls += 1;

                    let requested = message.tool_calls().to_vec();
                    answer = message.text().to_string();
                    conversation
                        .push_assistant(message)
                        .map_err(AgentError::Conversation)?;

                    state = if requested.is_empty() {
                        TurnState::Done
                    } else if !use_tools {
                        warn!(count = requested.len(), "Model requested tools while tool calling is disabled, ignoring.");
                        TurnState::Done
                    } else if model_calls >= MAX_MODEL_CALLS {
                        info!(
                            count = requested.len(),
                            tools = ?requested.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                            "Ignoring tool calls in the follow-up response."
                        );
                        TurnState::Done
                    } else {
                        info!(count = requested.len(), "AI requested {} tool call(s).", requested.len());
                        pending = requested;
                        TurnState::DispatchingTools
                    };
                }
                TurnState::DispatchingTools => {
                    for call in pending.drain(..) {
                        if let Some(result) = self.dispatch(&call).await {
                            conversation
                                .push_tool_result(&call.id, &call.name, &result.output)
                                .map_err(AgentError::Conversation)?;
                            tool_results.push(result);
                        }
                    }
                    debug!(count = tool_results.len(), "Tool results appended, asking the model again.");
                    state = TurnState::AwaitingModel;
                }
                TurnState::Done => break,
            }
        }

        info!(model_calls, tool_calls = tool_results.len(), "Turn finished.");
        Ok(TurnOutcome {
            answer,
            conversation,
            tool_results,
            model_calls,
        })
    }

    async fn call_model(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatMessage, AgentError> {
        debug!(
            provider = %self.provider.name(),
            num_messages = messages.len(),
            num_tools = tools.map_or(0, |t| t.len()),
            "Sending request to AI model."
        );

        let response = tokio::time::timeout(
            self.request_timeout,
            self.provider.get_completion(messages, tools),
        )
        .await
        .map_err(|_| {
            error!(timeout = ?self.request_timeout, "Model call timed out.");
            AgentError::Upstream(anyhow!(
                "no response from the model within {} seconds",
                self.request_timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            error!(error = ?e, "API call failed during turn.");
            AgentError::Upstream(e)
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            error!("API response contained no choices.");
            AgentError::Upstream(anyhow!("API response contained no choices"))
        })?;
        trace!(message = ?choice.message, finish_reason = %choice.finish_reason, "Assistant message");
        Ok(choice.message)
    }

    /// Runs one requested tool. `None` when the tool does not resolve.
    async fn dispatch(&self, call: &ToolCall) -> Option<ToolExecutionResult> {
        let input = call.decode_arguments();
        debug!(tool_call_id = %call.id, tool_name = %call.name, "Executing tool: '{}'", call.name);

        let Some(result) = self
            .tool_provider
            .execute_tool(&call.name, input.clone())
            .await
        else {
            warn!(tool_call_id = %call.id, tool_name = %call.name, "Model requested unknown tool '{}', skipping.", call.name);
            return None;
        };

        let (output, status) = match result {
            Ok(value) => {
                info!(tool_call_id = %call.id, tool_name = %call.name, "Tool '{}' executed successfully.", call.name);
                (value.to_string(), ToolExecutionStatus::Success)
            }
            Err(e) => (e.to_json().to_string(), ToolExecutionStatus::Failure),
        };
        trace!(tool_call_id = %call.id, output = %truncate_string(&output, LOG_PREVIEW_CHARS), "Output from tool '{}'", call.name);

        Some(ToolExecutionResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            input: serde_json::to_value(&input.arguments).unwrap_or_default(),
            output,
            status,
        })
    }
}
