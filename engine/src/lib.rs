//! Ensemble Engine Library
//!
//! Agents that run a model/tool loop, teams of agents bound to jobs, and an
//! agency that executes multi-step workflows over those jobs. Used by the
//! `ensemble` binary and by integration tests.

/// Agency built from an agency record
pub mod agency;

/// Agent execution loop
pub mod agent;

/// CLI interface module
pub mod cli;

/// Engine settings and agency records
pub mod config;

/// Command handlers module
pub mod handlers;

/// Model client abstraction and the Gemini client
pub mod llm;

/// Per-agent conversation history and scratchpad
pub mod memory;

/// Named event bus
pub mod notification_bus;

/// Teams of agents and their jobs
pub mod team;

/// Telemetry and Observability
pub mod telemetry;

/// Tool registry, invocation and built-in tools
pub mod tools;

/// Workflow validation and execution
pub mod workflow;
