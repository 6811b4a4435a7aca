//! Ensemble SDK
//!
//! Shared library providing traits, types, and utilities for Ensemble components.
//! This crate is used by the engine and by tool implementations.

/// Error types and handling
pub mod errors;

/// Tool trait and declaration types
pub mod tool;

/// Tool input types
pub mod types;

// Re-export commonly used types
pub use errors::{AgencyErrorExt, EngineError};
pub use tool::{FnTool, FunctionDeclaration, Tool};
pub use types::{ToolError, ToolInput};
