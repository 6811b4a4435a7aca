pub mod builtin;
pub mod invoker;

pub use builtin::{builtin_tool, CurrentTimeTool, HttpGetTool, BUILTIN_TOOL_NAMES};
pub use invoker::{ToolCallResult, ToolInvocationManager};

use sdk::errors::EngineError;
use sdk::tool::{FunctionDeclaration, Tool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of tools an agent can expose to its model.
///
/// Tools are validated on insertion so that a malformed tool is rejected with
/// a configuration error instead of failing when the model calls it. The
/// model-facing declaration list is re-derived on every mutation.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    declarations: Vec<FunctionDeclaration>,
}

impl ToolRegistry {
    /// Create an empty registry with no tools.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check that a tool has a usable name and declaration.
    ///
    /// The declaration must carry the same name as the tool and its
    /// parameters, when present, must be a JSON object.
    pub fn validate(tool: &dyn Tool) -> Result<FunctionDeclaration, EngineError> {
        let name = tool.name();
        if name.trim().is_empty() {
            return Err(EngineError::InvalidTool(
                "tool name must not be empty".to_string(),
            ));
        }

        let declaration = tool.declaration();
        if declaration.name != name {
            return Err(EngineError::InvalidTool(format!(
                "tool '{}' declares function '{}'",
                name, declaration.name
            )));
        }

        match &declaration.parameters {
            None | Some(serde_json::Value::Object(_)) => Ok(declaration),
            Some(other) => Err(EngineError::InvalidTool(format!(
                "tool '{}' parameters must be a JSON object, got {}",
                name, other
            ))),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    ///
    /// Returns the replaced tool, if any.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<Option<Arc<dyn Tool>>, EngineError> {
        Self::validate(tool.as_ref())?;

        let name = tool.name().to_string();
        let replaced = self.tools.insert(name.clone(), tool);
        if replaced.is_some() {
            warn!("Tool '{}' re-registered, previous definition replaced", name);
        } else {
            debug!("Tool '{}' registered", name);
        }

        self.rederive();
        Ok(replaced)
    }

    /// Remove a tool by name.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let removed = self.tools.remove(name);
        if removed.is_some() {
            self.rederive();
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Declarations advertised to the model, sorted by name.
    pub fn declarations(&self) -> &[FunctionDeclaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn rederive(&mut self) {
        self.declarations = self.tools.values().map(|t| t.declaration()).collect();
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
