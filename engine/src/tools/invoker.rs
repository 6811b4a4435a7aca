//! Tool Invocation Manager
//!
//! Executes the function calls requested by a model against an agent's tool
//! registry. Each call is isolated: an unknown tool or a tool that keeps
//! failing produces an error entry for that call only, and the remaining calls
//! of the batch still run. Failing tools are retried with a linear backoff
//! (`retry_delay * attempt`) up to `retry_attempts` invocations.

use super::ToolRegistry;
use crate::llm::FunctionCall;
use sdk::tool::Tool;
use sdk::types::{ToolError, ToolInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of invocations per call
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Outcome of one tool call: a result or an error, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCallResult {
    Success {
        #[serde(rename = "toolName")]
        tool_name: String,
        result: Value,
    },
    Failure {
        #[serde(rename = "toolName")]
        tool_name: String,
        error: String,
    },
}

impl ToolCallResult {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolCallResult::Success { tool_name, .. } | ToolCallResult::Failure { tool_name, .. } => {
                tool_name
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolCallResult::Success { .. })
    }

    /// Payload sent back to the model as the function response
    pub fn response_payload(&self) -> Value {
        match self {
            ToolCallResult::Success { result, .. } => serde_json::json!({ "result": result }),
            ToolCallResult::Failure { error, .. } => serde_json::json!({ "error": error }),
        }
    }
}

/// Executes tool calls with bounded retry
#[derive(Debug, Clone)]
pub struct ToolInvocationManager {
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Default for ToolInvocationManager {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl ToolInvocationManager {
    /// Create a manager. An attempt count of zero is treated as one.
    pub fn new(retry_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Execute a batch of calls in order
    ///
    /// The returned vector has one entry per call, in call order.
    pub async fn handle_tool_calls(
        &self,
        calls: &[FunctionCall],
        registry: &ToolRegistry,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let Some(tool) = registry.get(&call.name) else {
                warn!("Unknown tool requested: {}", call.name);
                results.push(ToolCallResult::Failure {
                    tool_name: call.name.clone(),
                    error: format!(
                        "Unknown tool '{}'. Available tools: {}",
                        call.name,
                        registry.names().join(", ")
                    ),
                });
                continue;
            };

            let input = match ToolInput::from_args(call.args.clone()) {
                Ok(input) => input,
                Err(e) => {
                    results.push(ToolCallResult::Failure {
                        tool_name: call.name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let entry = match self.execute_with_retry(tool.as_ref(), input).await {
                Ok(result) => ToolCallResult::Success {
                    tool_name: call.name.clone(),
                    result,
                },
                Err(e) => ToolCallResult::Failure {
                    tool_name: call.name.clone(),
                    error: e.to_string(),
                },
            };
            results.push(entry);
        }

        results
    }

    /// Invoke a tool, retrying failures with linear backoff
    ///
    /// After attempt `n` fails (and `n < retry_attempts`) the manager waits
    /// `retry_delay * n` before the next attempt. The last error is returned
    /// once attempts are exhausted.
    pub async fn execute_with_retry(
        &self,
        tool: &dyn Tool,
        input: ToolInput,
    ) -> Result<Value, ToolError> {
        let mut attempt: u32 = 1;

        loop {
            debug!(
                "Calling tool '{}' (attempt {}/{})",
                tool.name(),
                attempt,
                self.retry_attempts
            );

            match tool.call(input.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retry_attempts => {
                    let delay = self.retry_delay * attempt;
                    warn!(
                        "Tool '{}' failed on attempt {}: {}. Retrying in {:?}",
                        tool.name(),
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        "Tool '{}' failed after {} attempts: {}",
                        tool.name(),
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}
