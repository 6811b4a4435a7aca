//! Model client abstraction layer
//!
//! This module defines the request/response types exchanged with a language
//! model and the `ModelClient` trait every provider implements. The wire shape
//! follows the `generateContent` family of APIs: a request carries a list of
//! `Content` turns, an optional system instruction, optional function
//! declarations and a generation config; a response carries candidates whose
//! content is a list of parts, each either text or a function call.

use async_trait::async_trait;
use sdk::tool::FunctionDeclaration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub mod gemini;

pub use gemini::GeminiClient;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during model calls
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for sdk::errors::EngineError {
    fn from(err: LLMError) -> Self {
        sdk::errors::EngineError::LLMProvider(err.to_string())
    }
}

/// Author of a content turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Caller supplied input
    User,

    /// Model output
    Model,

    /// Function results sent back to the model
    Function,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
            Role::Function => write!(f, "function"),
        }
    }
}

/// Function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name of the tool to call
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Result of a function call, sent back to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One part of a content turn
///
/// Exactly one of `text`, `function_call` or `function_response` is normally
/// set. Provider keys this engine does not use are ignored on decode, so
/// parts carrying extra metadata still parse. A thought signature is kept so
/// the model turn can be replayed verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,

    /// Set on reasoning summaries, which are not part of the answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Default::default()
        }
    }

    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Default::default()
        }
    }

    /// Answer text, skipping thought summaries
    pub fn as_text(&self) -> Option<&str> {
        if self.thought == Some(true) {
            return None;
        }
        self.text.as_deref()
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        self.function_call.as_ref()
    }

    pub fn as_function_response(&self) -> Option<&FunctionResponse> {
        self.function_response.as_ref()
    }
}

/// A turn in the conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// Author of the turn. System instructions carry no role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn with a single text part
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a model turn
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::Model),
            parts,
        }
    }

    /// Create a function-result turn
    pub fn function(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::Function),
            parts,
        }
    }

    /// Create a role-less system instruction
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

/// Group of function declarations offered to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSet {
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// Sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,

    pub max_output_tokens: u32,

    /// Provider-specific fields passed through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1024,
            extra: Map::new(),
        }
    }
}

/// Request sent to a model client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Omitted entirely when the agent has no tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSet>>,

    pub generation_config: GenerationConfig,
}

/// One candidate completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Absent when the candidate was blocked before producing output
    #[serde(default)]
    pub content: Content,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Response from a model client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Response with one candidate holding a single text part
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::text(text)])
    }

    /// Response with one candidate requesting the given calls
    pub fn from_function_calls(calls: Vec<FunctionCall>) -> Self {
        Self::from_parts(calls.into_iter().map(Part::function_call).collect())
    }

    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Content::model(parts),
                finish_reason: None,
            }],
        }
    }

    /// Parts of the first candidate
    pub fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .map(|c| c.content.parts.as_slice())
            .unwrap_or_default()
    }

    /// Function calls of the first candidate, in order
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.parts()
            .iter()
            .filter_map(Part::as_function_call)
            .cloned()
            .collect()
    }

    /// Concatenation of the text parts of the first candidate
    pub fn text(&self) -> String {
        self.parts().iter().filter_map(Part::as_text).collect()
    }

    /// The first candidate's content as a model turn, for replaying it back
    pub fn model_turn(&self) -> Content {
        Content::model(self.parts().to_vec())
    }
}

/// Model client trait that all providers must implement
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini")
    fn name(&self) -> &str;

    /// Generate a response
    ///
    /// # Returns
    /// * `Ok(GenerateContentResponse)` - candidates holding text and/or function calls
    /// * `Err(LLMError)` - transport, authentication or decoding failure
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}
