//! Tool trait and function-declaration schema types
//!
//! A tool is a named capability an agent can expose to its model. The model
//! sees the tool's `FunctionDeclaration`; when it asks for a call, the engine
//! invokes `Tool::call` with the model-supplied arguments.

use crate::types::{ToolError, ToolInput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Function declaration advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    /// Function name, must equal the owning tool's name
    pub name: String,

    /// Human readable description used by the model to pick the tool
    #[serde(default)]
    pub description: String,

    /// JSON schema object describing the arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl FunctionDeclaration {
    /// Create a declaration without parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Attach a parameters schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool
    fn name(&self) -> &str;

    /// Returns the declaration exposed to the model
    fn declaration(&self) -> FunctionDeclaration;

    /// Invoke the tool
    async fn call(&self, input: ToolInput) -> Result<Value, ToolError>;
}

type BoxedCall =
    Box<dyn Fn(ToolInput) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>> + Send + Sync>;

/// Tool backed by a closure
///
/// ```
/// use sdk::tool::{FnTool, FunctionDeclaration, Tool};
/// use serde_json::json;
///
/// let echo = FnTool::new(
///     FunctionDeclaration::new("echo", "Echo the arguments back"),
///     |input| async move { Ok(input.into_value()) },
/// );
/// assert_eq!(echo.name(), "echo");
/// ```
pub struct FnTool {
    declaration: FunctionDeclaration,
    call: BoxedCall,
}

impl FnTool {
    pub fn new<F, Fut>(declaration: FunctionDeclaration, f: F) -> Self
    where
        F: Fn(ToolInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            declaration,
            call: Box::new(move |input| Box::pin(f(input))),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("declaration", &self.declaration)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.declaration.name
    }

    fn declaration(&self) -> FunctionDeclaration {
        self.declaration.clone()
    }

    async fn call(&self, input: ToolInput) -> Result<Value, ToolError> {
        (self.call)(input).await
    }
}
