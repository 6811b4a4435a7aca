//! Agents
//!
//! An agent combines a model client, a tool registry, a memory store and a
//! role/goal prompt. Its single entry point, [`Agent::run`], implements the
//! think-act-observe loop described in [`core`].

pub mod core;
pub mod format;

pub use core::{Agent, AgentBuilder, AgentStatus, GenerationHook, RunContext};
pub use format::{DefaultFormatter, InputFormatter, ResponseProcessor, TextProcessor};
