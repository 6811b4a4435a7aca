//! Error types and handling
//!
//! This module provides the error types used throughout the Ensemble engine.
//! All errors implement the `AgencyErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Error Categories
//!
//! - **Configuration**: missing agents, jobs or workflows, malformed tools,
//!   bad input references. Raised at construction or at the point of reference.
//! - **Tool**: tool execution failures, recorded per call after retries.
//! - **LLM Provider**: model call failures, never retried by the agent.
//! - **Workflow**: job failures, timeouts and failed upstream dependencies.

use thiserror::Error;

/// Trait for Ensemble error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait AgencyErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors require the configuration to be fixed first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{AgencyErrorExt, EngineError};
///
/// let error = EngineError::ToolError("search backend returned 503".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::UnknownWorkflow("release".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid tool: {0}")]
    InvalidTool(String),

    #[error("Agent {0} has no model client")]
    MissingModelClient(String),

    #[error("Invalid reference '{reference}' in job {job_id}: {reason}")]
    InvalidReference {
        job_id: String,
        reference: String,
        reason: String,
    },

    #[error("Job {job_id} references jobs.{target}.output which does not run in an earlier step")]
    ForwardReference { job_id: String, target: String },

    #[error("Agent {agent_id} is bound to more than one job in step {step}")]
    AgentReusedInStep { agent_id: String, step: usize },

    #[error("Schema violation for job {job_id} {direction}: {reason}")]
    SchemaViolation {
        job_id: String,
        direction: String,
        reason: String,
    },

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // Workflow errors
    #[error("Job {job_id} failed in step {step}: {cause}")]
    JobFailed {
        job_id: String,
        step: usize,
        cause: String,
    },

    #[error("Job {job_id} timed out after {timeout_ms}ms")]
    JobTimeout { job_id: String, timeout_ms: u64 },

    #[error("Job {job_id} depends on failed job {upstream}")]
    UpstreamFailed { job_id: String, upstream: String },

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Returns true for errors raised by configuration problems rather than
    /// by execution.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownAgent(_)
                | Self::UnknownJob(_)
                | Self::UnknownWorkflow(_)
                | Self::UnknownEvent(_)
                | Self::InvalidTool(_)
                | Self::MissingModelClient(_)
                | Self::InvalidReference { .. }
                | Self::ForwardReference { .. }
                | Self::AgentReusedInStep { .. }
        )
    }
}

impl AgencyErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            // Configuration errors
            Self::Config(_) => "Check your configuration files for errors",
            Self::UnknownAgent(_) => "Define the agent under 'agents' before referencing it",
            Self::UnknownJob(_) => "Define the job in a team before using it in a workflow",
            Self::UnknownWorkflow(_) => "Check the workflow id against 'workflows'",
            Self::UnknownEvent(_) => "Subscribe to a known event name or a 'prefix*' pattern",
            Self::InvalidTool(_) => "Tools need a name matching their function declaration",
            Self::MissingModelClient(_) => "Every agent needs a model client",
            Self::InvalidReference { .. } => {
                "Use 'brief.<key>' or 'jobs.<id>.output' with existing keys"
            }
            Self::ForwardReference { .. } => "A job can only read outputs of earlier steps",
            Self::AgentReusedInStep { .. } => {
                "Split jobs sharing an agent into separate workflow steps"
            }
            Self::SchemaViolation { .. } => "Job data does not match its declared schema",

            // LLM provider errors
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",

            // Tool errors
            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",

            // Workflow errors
            Self::JobFailed { .. } => "A workflow job failed. Check the job's agent logs",
            Self::JobTimeout { .. } => "Job took too long. Raise the timeout or simplify the job",
            Self::UpstreamFailed { .. } => "Fix the failing upstream job first",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::SchemaViolation { .. } => false,
            other if other.is_config_error() => false,
            _ => true,
        }
    }
}
