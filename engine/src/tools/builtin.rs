//! Built-in tools
//!
//! Small tools that agent configs can reference by name without any code:
//! `current_time` and `http_get`.

use async_trait::async_trait;
use chrono::Utc;
use sdk::tool::{FunctionDeclaration, Tool};
use sdk::types::{ToolError, ToolInput};
use serde_json::{json, Value};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Names accepted in an agent's `tools` list
pub const BUILTIN_TOOL_NAMES: &[&str] = &["current_time", "http_get"];

/// Maximum number of body bytes returned by `http_get`
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Look up a built-in tool by name
pub fn builtin_tool(name: &str) -> Option<Arc<dyn Tool>> {
    match name {
        "current_time" => Some(Arc::new(CurrentTimeTool)),
        "http_get" => Some(Arc::new(HttpGetTool::new())),
        _ => None,
    }
}

/// Returns the current UTC time
#[derive(Debug, Default)]
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration::new(
            "current_time",
            "Get the current UTC date and time. Returns RFC 3339 unless a strftime format is given.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Optional strftime format, e.g. %Y-%m-%d"
                }
            }
        }))
    }

    async fn call(&self, input: ToolInput) -> Result<Value, ToolError> {
        let now = Utc::now();

        let Some(format) = input.param_str_opt("format") else {
            return Ok(Value::String(now.to_rfc3339()));
        };

        let mut out = String::new();
        write!(out, "{}", now.format(&format))
            .map_err(|_| ToolError::InvalidParameter(format!("bad time format '{}'", format)))?;
        Ok(Value::String(out))
    }
}

/// Fetches a URL and returns its status and (truncated) body
#[derive(Debug, Clone)]
pub struct HttpGetTool {
    client: reqwest::Client,
}

impl Default for HttpGetTool {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpGetTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &str {
        "http_get"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration::new(
            "http_get",
            "Fetch a URL with HTTP GET and return the status code and response body.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute http(s) URL"}
            },
            "required": ["url"]
        }))
    }

    async fn call(&self, input: ToolInput) -> Result<Value, ToolError> {
        let url = input.param_str("url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::InvalidParameter(format!(
                "url must start with http:// or https://, got '{}'",
                url
            )));
        }

        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let (body, truncated) = truncate_body(body);

        Ok(json!({
            "status": status,
            "body": body,
            "truncated": truncated,
        }))
    }
}

fn truncate_body(mut body: String) -> (String, bool) {
    if body.len() <= MAX_BODY_BYTES {
        return (body, false);
    }

    let mut cut = MAX_BODY_BYTES;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    (body, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_builtin_lookup() {
        for name in BUILTIN_TOOL_NAMES {
            let tool = builtin_tool(name).unwrap();
            assert_eq!(tool.name(), *name);
            assert_eq!(tool.declaration().name, *name);
        }
        assert!(builtin_tool("rm_rf").is_none());
    }

    #[tokio::test]
    async fn test_current_time_default_is_rfc3339() {
        let value = CurrentTimeTool.call(ToolInput::new()).await.unwrap();
        let text = value.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
    }

    #[tokio::test]
    async fn test_current_time_custom_format() {
        let input = ToolInput::new().with_param("format", json!("%Y"));
        let value = CurrentTimeTool.call(input).await.unwrap();
        assert_eq!(value.as_str().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_current_time_bad_format() {
        let input = ToolInput::new().with_param("format", json!("%Q"));
        assert!(CurrentTimeTool.call(input).await.is_err());
    }

    #[tokio::test]
    async fn test_http_get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("all good"))
            .mount(&server)
            .await;

        let input = ToolInput::new().with_param("url", json!(format!("{}/status", server.uri())));
        let value = HttpGetTool::new().call(input).await.unwrap();

        assert_eq!(value["status"], 200);
        assert_eq!(value["body"], "all good");
        assert_eq!(value["truncated"], false);
    }

    #[tokio::test]
    async fn test_http_get_rejects_non_http_url() {
        let input = ToolInput::new().with_param("url", json!("file:///etc/passwd"));
        let err = HttpGetTool::new().call(input).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let body = "é".repeat(MAX_BODY_BYTES);
        let (truncated, was_truncated) = truncate_body(body);
        assert!(was_truncated);
        assert!(truncated.len() <= MAX_BODY_BYTES);
        assert!(truncated.chars().all(|c| c == 'é'));

        let (short, was_truncated) = truncate_body("ok".to_string());
        assert_eq!(short, "ok");
        assert!(!was_truncated);
    }
}
