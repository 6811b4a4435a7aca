//! Event catalogue for the notification bus

use crate::agent::AgentStatus;
use crate::llm::{Content, FunctionCall, GenerateContentResponse};
use crate::memory::HistoryEntry;
use crate::tools::ToolCallResult;
use crate::workflow::WorkflowStatus;
use sdk::errors::EngineError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Every kind of event the engine emits
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    StatusChanged,
    RunStarted,
    InputFormatted,
    LlmResponseReceived,
    ToolCallsDetected,
    ToolCallsHandled,
    RunCompleted,
    RunError,
    ToolAdded,
    ToolRemoved,
    HistoryUpdated,
    MemoryUpdated,
    MemoryForgotten,
    MemoryCleared,
    WorkflowStarted,
    JobStarted,
    JobCompleted,
    JobFailed,
    WorkflowCompleted,
}

impl EventKind {
    pub const ALL: [EventKind; 19] = [
        EventKind::StatusChanged,
        EventKind::RunStarted,
        EventKind::InputFormatted,
        EventKind::LlmResponseReceived,
        EventKind::ToolCallsDetected,
        EventKind::ToolCallsHandled,
        EventKind::RunCompleted,
        EventKind::RunError,
        EventKind::ToolAdded,
        EventKind::ToolRemoved,
        EventKind::HistoryUpdated,
        EventKind::MemoryUpdated,
        EventKind::MemoryForgotten,
        EventKind::MemoryCleared,
        EventKind::WorkflowStarted,
        EventKind::JobStarted,
        EventKind::JobCompleted,
        EventKind::JobFailed,
        EventKind::WorkflowCompleted,
    ];

    /// Wire name used for subscriptions
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusChanged => "statusChanged",
            EventKind::RunStarted => "runStarted",
            EventKind::InputFormatted => "inputFormatted",
            EventKind::LlmResponseReceived => "llmResponseReceived",
            EventKind::ToolCallsDetected => "toolCallsDetected",
            EventKind::ToolCallsHandled => "toolCallsHandled",
            EventKind::RunCompleted => "runCompleted",
            EventKind::RunError => "runError",
            EventKind::ToolAdded => "toolAdded",
            EventKind::ToolRemoved => "toolRemoved",
            EventKind::HistoryUpdated => "historyUpdated",
            EventKind::MemoryUpdated => "memoryUpdated",
            EventKind::MemoryForgotten => "memoryForgotten",
            EventKind::MemoryCleared => "memoryCleared",
            EventKind::WorkflowStarted => "workflowStarted",
            EventKind::JobStarted => "jobStarted",
            EventKind::JobCompleted => "jobCompleted",
            EventKind::JobFailed => "jobFailed",
            EventKind::WorkflowCompleted => "workflowCompleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::UnknownEvent(s.to_string()))
    }
}

/// Events published on the notification bus
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    /// Agent status transition
    StatusChanged {
        agent_id: String,
        from: AgentStatus,
        to: AgentStatus,
    },
    /// Agent run began
    RunStarted { agent_id: String, input: Value },
    /// Input converted to model messages
    InputFormatted {
        agent_id: String,
        messages: Vec<Content>,
    },
    /// Raw model response
    LlmResponseReceived {
        agent_id: String,
        response: GenerateContentResponse,
    },
    /// Model asked for tool calls
    ToolCallsDetected {
        agent_id: String,
        calls: Vec<FunctionCall>,
    },
    /// Tool calls finished (successfully or not)
    ToolCallsHandled {
        agent_id: String,
        results: Vec<ToolCallResult>,
    },
    /// Agent run finished
    RunCompleted {
        agent_id: String,
        input: Value,
        response: String,
    },
    /// Agent run failed
    RunError {
        agent_id: String,
        input: Value,
        error: String,
    },
    ToolAdded { agent_id: String, tool: String },
    ToolRemoved { agent_id: String, tool: String },
    /// Conversation history changed; carries the full current history
    HistoryUpdated {
        owner: String,
        history: Vec<HistoryEntry>,
    },
    /// Scratchpad value changed
    MemoryUpdated {
        owner: String,
        key: String,
        value: Value,
        old_value: Option<Value>,
    },
    MemoryForgotten {
        owner: String,
        key: String,
        value: Value,
    },
    MemoryCleared { owner: String },
    WorkflowStarted {
        execution_id: String,
        workflow_id: String,
    },
    JobStarted {
        execution_id: String,
        job_id: String,
        agent_id: String,
    },
    JobCompleted {
        execution_id: String,
        job_id: String,
    },
    JobFailed {
        execution_id: String,
        job_id: String,
        error: String,
    },
    WorkflowCompleted {
        execution_id: String,
        workflow_id: String,
        status: WorkflowStatus,
    },
}

impl Event {
    /// Get the kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StatusChanged { .. } => EventKind::StatusChanged,
            Event::RunStarted { .. } => EventKind::RunStarted,
            Event::InputFormatted { .. } => EventKind::InputFormatted,
            Event::LlmResponseReceived { .. } => EventKind::LlmResponseReceived,
            Event::ToolCallsDetected { .. } => EventKind::ToolCallsDetected,
            Event::ToolCallsHandled { .. } => EventKind::ToolCallsHandled,
            Event::RunCompleted { .. } => EventKind::RunCompleted,
            Event::RunError { .. } => EventKind::RunError,
            Event::ToolAdded { .. } => EventKind::ToolAdded,
            Event::ToolRemoved { .. } => EventKind::ToolRemoved,
            Event::HistoryUpdated { .. } => EventKind::HistoryUpdated,
            Event::MemoryUpdated { .. } => EventKind::MemoryUpdated,
            Event::MemoryForgotten { .. } => EventKind::MemoryForgotten,
            Event::MemoryCleared { .. } => EventKind::MemoryCleared,
            Event::WorkflowStarted { .. } => EventKind::WorkflowStarted,
            Event::JobStarted { .. } => EventKind::JobStarted,
            Event::JobCompleted { .. } => EventKind::JobCompleted,
            Event::JobFailed { .. } => EventKind::JobFailed,
            Event::WorkflowCompleted { .. } => EventKind::WorkflowCompleted,
        }
    }

    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}
