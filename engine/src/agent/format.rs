//! Input formatting and response processing hooks

use super::RunContext;
use crate::llm::{Content, GenerateContentResponse};
use serde_json::Value;

/// Turns a run input into model messages
pub trait InputFormatter: Send + Sync {
    fn format(&self, input: &Value, context: &RunContext) -> anyhow::Result<Vec<Content>>;
}

/// Turns the final model response into the run's text result
pub trait ResponseProcessor: Send + Sync {
    fn process(&self, response: &GenerateContentResponse) -> anyhow::Result<String>;
}

/// Wraps the input as one user message
///
/// Strings are sent verbatim; other JSON values are pretty printed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl InputFormatter for DefaultFormatter {
    fn format(&self, input: &Value, _context: &RunContext) -> anyhow::Result<Vec<Content>> {
        let text = match input {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other)?,
        };
        Ok(vec![Content::user(text)])
    }
}

/// Concatenates the text parts of the first candidate
#[derive(Debug, Default, Clone, Copy)]
pub struct TextProcessor;

impl ResponseProcessor for TextProcessor {
    fn process(&self, response: &GenerateContentResponse) -> anyhow::Result<String> {
        Ok(response.text())
    }
}

impl<F> InputFormatter for F
where
    F: Fn(&Value, &RunContext) -> anyhow::Result<Vec<Content>> + Send + Sync,
{
    fn format(&self, input: &Value, context: &RunContext) -> anyhow::Result<Vec<Content>> {
        self(input, context)
    }
}
