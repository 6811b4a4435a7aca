//! Integration tests for the agent loop against a mocked Gemini endpoint
//!
//! Validates the request wire shape, the tool-call round trip and error
//! propagation from the provider.

use async_trait::async_trait;
use ensemble_engine::agent::{Agent, AgentStatus, RunContext};
use ensemble_engine::config::{GeminiConfig, ModelSettings};
use ensemble_engine::llm::GeminiClient;
use ensemble_engine::notification_bus::{EventKind, NotificationBus};
use ensemble_engine::tools::ToolInvocationManager;
use sdk::tool::{FunctionDeclaration, Tool};
use sdk::types::{ToolError, ToolInput};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const MODEL_PATH: &str = "/models/test-model:generateContent";

fn gemini(server: &MockServer) -> Arc<GeminiClient> {
    let config = GeminiConfig {
        base_url: server.uri(),
        model: "test-model".to_string(),
        api_key_env: "ENSEMBLE_TEST_KEY".to_string(),
    };
    Arc::new(GeminiClient::new(config, "secret"))
}

fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Fails a fixed number of times, then reports the weather
struct FlakyWeather {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl Tool for FlakyWeather {
    fn name(&self) -> &str {
        "weather"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration::new("weather", "Current weather for a city").with_parameters(json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }))
    }

    async fn call(&self, input: ToolInput) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let city = input.param_str("city")?;
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ToolError::Execution("sensor timeout".to_string()));
        }
        Ok(json!({"city": city, "forecast": "sunny"}))
    }
}

#[tokio::test]
async fn test_plain_text_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "secret"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Say hi"}]}],
            "systemInstruction": {"parts": [{"text": "You greet people.\n\nYour goals:\n1. Be brief"}]},
            "generationConfig": {"temperature": 0.2, "maxOutputTokens": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("Hi!")))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("greeter")
        .role("You greet people.")
        .goal("Be brief")
        .settings(ModelSettings {
            temperature: Some(0.2),
            max_output_tokens: Some(64),
            ..Default::default()
        })
        .client(gemini(&server))
        .build()
        .unwrap();

    let response = agent.run(json!("Say hi"), &RunContext::new()).await.unwrap();

    assert_eq!(response, "Hi!");
    assert_eq!(agent.status(), AgentStatus::Idle);
    assert_eq!(agent.history(None).len(), 1);
}

#[tokio::test]
async fn test_tool_call_round_trip_with_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "weather", "args": {"city": "Lisbon"}}}]
                }
            }]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user"},
                {"role": "model"},
                {"role": "function", "parts": [{
                    "functionResponse": {
                        "name": "weather",
                        "response": {"result": {"city": "Lisbon", "forecast": "sunny"}}
                    }
                }]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("Sunny in Lisbon")))
        .expect(1)
        .mount(&server)
        .await;

    let tool = Arc::new(FlakyWeather {
        failures_left: AtomicUsize::new(2),
        calls: AtomicUsize::new(0),
    });
    let bus = NotificationBus::new();
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    bus.subscribe("toolCalls*", move |event| {
        sink.lock().unwrap().push(event.kind());
        Ok(())
    })
    .unwrap();

    let agent = Agent::builder("forecaster")
        .client(gemini(&server))
        .bus(bus)
        .invoker(ToolInvocationManager::new(3, Duration::from_millis(10)))
        .tool(Arc::clone(&tool) as Arc<dyn Tool>)
        .build()
        .unwrap();

    let response = agent
        .run(json!("Weather in Lisbon?"), &RunContext::new())
        .await
        .unwrap();

    assert_eq!(response, "Sunny in Lisbon");
    assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *kinds.lock().unwrap(),
        vec![EventKind::ToolCallsDetected, EventKind::ToolCallsHandled]
    );
}

#[tokio::test]
async fn test_parts_with_thought_metadata_are_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "The user wants the time.", "thought": true},
                        {
                            "functionCall": {"name": "current_time", "args": {}},
                            "thoughtSignature": "sig-1"
                        }
                    ]
                }
            }]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    // The signed call is replayed to the model as it was received
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user"},
                {"role": "model", "parts": [
                    {"thought": true},
                    {"functionCall": {"name": "current_time"}, "thoughtSignature": "sig-1"}
                ]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Checked the clock.", "thought": true},
                        {"text": "It is noon."}
                    ]
                },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("clock")
        .client(gemini(&server))
        .tool(ensemble_engine::tools::builtin_tool("current_time").unwrap())
        .build()
        .unwrap();

    let response = agent.run(json!("time?"), &RunContext::new()).await.unwrap();
    assert_eq!(response, "It is noon.");
}

#[tokio::test]
async fn test_blocked_candidate_yields_empty_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("careful")
        .client(gemini(&server))
        .build()
        .unwrap();

    let response = agent.run(json!("anything"), &RunContext::new()).await.unwrap();
    assert_eq!(response, "");
    assert_eq!(agent.status(), AgentStatus::Idle);
}

#[tokio::test]
async fn test_provider_error_sets_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let bus = NotificationBus::new();
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    bus.subscribe("runError", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let agent = Agent::builder("unlucky")
        .client(gemini(&server))
        .bus(bus)
        .build()
        .unwrap();

    let err = agent
        .run(json!("anything"), &RunContext::new())
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Rate limit exceeded"));
    assert_eq!(agent.status(), AgentStatus::Error);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(agent.history(None).is_empty());
}

#[tokio::test]
async fn test_tools_declared_only_when_registered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_partial_json(json!({
            "tools": [{"functionDeclarations": [{"name": "current_time"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("noon")))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("clock")
        .client(gemini(&server))
        .build()
        .unwrap();
    agent
        .add_tool(ensemble_engine::tools::builtin_tool("current_time").unwrap())
        .unwrap();

    let response = agent.run(json!("time?"), &RunContext::new()).await.unwrap();
    assert_eq!(response, "noon");
}
