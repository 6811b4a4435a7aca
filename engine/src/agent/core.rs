//! Agent Core
//!
//! This module implements the agent execution loop. One call to
//! [`Agent::run`] walks this state machine:
//!
//! 1. Set status to working, emit `runStarted`
//! 2. Format the input into model messages
//! 3. Call the model with the system instruction, tool declarations and the
//!    merged generation config
//! 4. If the response asks for tool calls: run them through the tool
//!    invocation manager and call the model a second time with the results;
//!    the second response is final
//! 5. Process the final response into text, append it to memory, set status
//!    back to idle, emit `runCompleted`
//!
//! Any failure sets status to error and emits `runError`. Model calls are not
//! retried here; retries happen only for tool calls.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use super::format::{DefaultFormatter, InputFormatter, ResponseProcessor, TextProcessor};
use crate::config::{AgentConfig, ModelSettings};
use crate::llm::{
    Content, FunctionResponse, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ModelClient, Part, ToolSet,
};
use crate::memory::{HistoryEntry, MemoryStore};
use crate::notification_bus::{Event, NotificationBus};
use crate::tools::{ToolInvocationManager, ToolRegistry};
use sdk::errors::EngineError;
use sdk::tool::{FunctionDeclaration, Tool};

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// Immutable per-run context
///
/// Passed by reference into every run; the agent never stores it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    pub execution_id: Option<String>,
    pub job_id: Option<String>,
    /// Caller supplied values, available to custom formatters
    pub values: Map<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for one job of a workflow execution
    pub fn for_job(
        execution_id: impl Into<String>,
        job_id: impl Into<String>,
        values: Map<String, Value>,
    ) -> Self {
        Self {
            execution_id: Some(execution_id.into()),
            job_id: Some(job_id.into()),
            values,
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

/// Last-word adjustment of the generation config, applied after agent settings
pub type GenerationHook = Arc<dyn Fn(&mut GenerationConfig) + Send + Sync>;

/// LLM-backed worker with tools and memory
pub struct Agent {
    id: String,
    name: String,
    description: String,
    role: String,
    goals: Vec<String>,
    settings: ModelSettings,

    client: Arc<dyn ModelClient>,
    bus: NotificationBus,
    invoker: ToolInvocationManager,
    formatter: Arc<dyn InputFormatter>,
    processor: Arc<dyn ResponseProcessor>,
    generation_hook: Option<GenerationHook>,

    status: Mutex<AgentStatus>,
    tools: RwLock<ToolRegistry>,
    memory: Mutex<MemoryStore>,
}

impl Agent {
    /// Start building an agent with the given id
    pub fn builder(id: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn status(&self) -> AgentStatus {
        *lock(&self.status)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.read_tools().names()
    }

    /// Declarations currently advertised to the model
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.read_tools().declarations().to_vec()
    }

    /// Last `limit` history entries, oldest first
    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        self.memory().get_history(limit)
    }

    /// Exclusive access to the agent's memory store
    ///
    /// The guard must not be held across an `.await`, and listeners of memory
    /// events must not call back into this method.
    pub fn memory(&self) -> MutexGuard<'_, MemoryStore> {
        lock(&self.memory)
    }

    /// Add a tool, replacing any tool with the same name
    ///
    /// # Errors
    /// Returns `EngineError::InvalidTool` if the tool has no name, its
    /// declaration names a different function, or its parameters are not an
    /// object.
    pub fn add_tool(&self, tool: Arc<dyn Tool>) -> Result<(), EngineError> {
        let name = tool.name().to_string();
        {
            let mut tools = self.tools.write().unwrap_or_else(|p| p.into_inner());
            tools.register(tool)?;
        }

        self.bus.emit(Event::ToolAdded {
            agent_id: self.id.clone(),
            tool: name,
        });
        Ok(())
    }

    /// Remove a tool by name. Returns whether a tool was removed.
    pub fn remove_tool(&self, name: &str) -> bool {
        let removed = {
            let mut tools = self.tools.write().unwrap_or_else(|p| p.into_inner());
            tools.remove(name).is_some()
        };

        if removed {
            self.bus.emit(Event::ToolRemoved {
                agent_id: self.id.clone(),
                tool: name.to_string(),
            });
        }
        removed
    }

    /// Run the agent on one input
    ///
    /// Returns the processed text of the final model response.
    pub async fn run(&self, input: Value, context: &RunContext) -> Result<String> {
        self.set_status(AgentStatus::Working);
        self.bus.emit(Event::RunStarted {
            agent_id: self.id.clone(),
            input: input.clone(),
        });

        info!(
            "Agent {} starting run{}",
            self.id,
            context
                .job_id
                .as_deref()
                .map(|job| format!(" for job {}", job))
                .unwrap_or_default()
        );

        let mut guard = RunGuard {
            agent: self,
            input: Some(input.clone()),
        };
        let outcome = self.execute(&input, context).await;
        guard.input = None;

        match outcome {
            Ok(response) => {
                self.memory()
                    .add_to_history(HistoryEntry::new(input.clone(), response.clone()));
                self.set_status(AgentStatus::Idle);
                self.bus.emit(Event::RunCompleted {
                    agent_id: self.id.clone(),
                    input,
                    response: response.clone(),
                });
                debug!("Agent {} completed run", self.id);
                Ok(response)
            }
            Err(e) => {
                warn!("Agent {} run failed: {:#}", self.id, e);
                self.set_status(AgentStatus::Error);
                self.bus.emit(Event::RunError {
                    agent_id: self.id.clone(),
                    input,
                    error: format!("{:#}", e),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, input: &Value, context: &RunContext) -> Result<String> {
        let messages = self
            .formatter
            .format(input, context)
            .context("Failed to format input")?;
        self.bus.emit(Event::InputFormatted {
            agent_id: self.id.clone(),
            messages: messages.clone(),
        });

        // Snapshot so no lock is held across the model and tool calls
        let registry = self.read_tools().clone();

        let first = self.call_model(messages.clone(), &registry).await?;

        let calls = first.function_calls();
        let final_response = if calls.is_empty() {
            first
        } else {
            debug!("Agent {} handling {} tool call(s)", self.id, calls.len());
            self.bus.emit(Event::ToolCallsDetected {
                agent_id: self.id.clone(),
                calls: calls.clone(),
            });

            let results = self.invoker.handle_tool_calls(&calls, &registry).await;
            self.bus.emit(Event::ToolCallsHandled {
                agent_id: self.id.clone(),
                results: results.clone(),
            });

            let function_turn = Content::function(
                results
                    .iter()
                    .map(|result| {
                        Part::function_response(FunctionResponse {
                            name: result.tool_name().to_string(),
                            response: result.response_payload(),
                        })
                    })
                    .collect(),
            );

            let mut follow_up = messages;
            follow_up.push(first.model_turn());
            follow_up.push(function_turn);

            self.call_model(follow_up, &registry).await?
        };

        self.processor
            .process(&final_response)
            .context("Failed to process model response")
    }

    async fn call_model(
        &self,
        contents: Vec<Content>,
        registry: &ToolRegistry,
    ) -> Result<GenerateContentResponse> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction(),
            tools: (!registry.is_empty()).then(|| {
                vec![ToolSet {
                    function_declarations: registry.declarations().to_vec(),
                }]
            }),
            generation_config: self.generation_config(),
        };

        let response = self
            .client
            .generate_content(&request)
            .await
            .map_err(EngineError::from)
            .with_context(|| format!("Model call failed for agent {}", self.id))?;

        self.bus.emit(Event::LlmResponseReceived {
            agent_id: self.id.clone(),
            response: response.clone(),
        });
        Ok(response)
    }

    /// Role text followed by the numbered goal list
    pub fn system_instruction(&self) -> Option<Content> {
        let mut text = self.role.trim().to_string();

        if !self.goals.is_empty() {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str("Your goals:");
            for (i, goal) in self.goals.iter().enumerate() {
                text.push_str(&format!("\n{}. {}", i + 1, goal));
            }
        }

        (!text.is_empty()).then(|| Content::system(text))
    }

    /// Defaults, then agent settings, then the generation hook
    pub fn generation_config(&self) -> GenerationConfig {
        let mut config = GenerationConfig::default();
        self.settings.apply(&mut config);
        if let Some(hook) = &self.generation_hook {
            hook(&mut config);
        }
        config
    }

    fn set_status(&self, to: AgentStatus) {
        let from = std::mem::replace(&mut *lock(&self.status), to);
        if from != to {
            self.bus.emit(Event::StatusChanged {
                agent_id: self.id.clone(),
                from,
                to,
            });
        }
    }

    fn read_tools(&self) -> std::sync::RwLockReadGuard<'_, ToolRegistry> {
        self.tools.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// Marks a run that was dropped before it settled, e.g. by a job timeout
struct RunGuard<'a> {
    agent: &'a Agent,
    input: Option<Value>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(input) = self.input.take() {
            warn!("Agent {} run cancelled", self.agent.id);
            self.agent.set_status(AgentStatus::Error);
            self.agent.bus.emit(Event::RunError {
                agent_id: self.agent.id.clone(),
                input,
                error: "cancelled".to_string(),
            });
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("client", &self.client.name())
            .field("status", &self.status())
            .field("tools", &self.tool_names())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    id: String,
    config: AgentConfig,
    client: Option<Arc<dyn ModelClient>>,
    bus: Option<NotificationBus>,
    invoker: ToolInvocationManager,
    tools: Vec<Arc<dyn Tool>>,
    formatter: Arc<dyn InputFormatter>,
    processor: Arc<dyn ResponseProcessor>,
    generation_hook: Option<GenerationHook>,
    max_history_length: Option<usize>,
}

impl AgentBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: AgentConfig::default(),
            client: None,
            bus: None,
            invoker: ToolInvocationManager::default(),
            tools: Vec::new(),
            formatter: Arc::new(DefaultFormatter),
            processor: Arc::new(TextProcessor),
            generation_hook: None,
            max_history_length: None,
        }
    }

    /// Start from an agent record
    ///
    /// Tool names in the record are not resolved here; pass tools with
    /// [`AgentBuilder::tool`].
    pub fn from_config(id: impl Into<String>, config: &AgentConfig) -> Self {
        let mut builder = Self::new(id);
        builder.max_history_length = config.max_history_length;
        builder.config = config.clone();
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.config.role = role.into();
        self
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.config.goals.push(goal.into());
        self
    }

    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.config.model = settings;
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn bus(mut self, bus: NotificationBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn invoker(mut self, invoker: ToolInvocationManager) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn InputFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn processor(mut self, processor: Arc<dyn ResponseProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn generation_hook(mut self, hook: GenerationHook) -> Self {
        self.generation_hook = Some(hook);
        self
    }

    pub fn max_history_length(mut self, max: usize) -> Self {
        self.max_history_length = Some(max);
        self
    }

    /// Build the agent
    ///
    /// # Errors
    /// - `MissingModelClient` if no client was supplied
    /// - `InvalidTool` if any tool fails validation
    /// - `Config` if the history bound is zero
    pub fn build(self) -> Result<Agent, EngineError> {
        let client = self
            .client
            .ok_or_else(|| EngineError::MissingModelClient(self.id.clone()))?;
        let bus = self.bus.unwrap_or_default();

        let mut registry = ToolRegistry::empty();
        for tool in self.tools {
            registry.register(tool)?;
        }

        let memory = match self.max_history_length {
            Some(max) => MemoryStore::with_limit(self.id.clone(), bus.clone(), max)?,
            None => MemoryStore::new(self.id.clone(), bus.clone()),
        };

        let name = if self.config.name.is_empty() {
            self.id.clone()
        } else {
            self.config.name
        };

        debug!(
            "Built agent {} with {} tool(s) on {}",
            self.id,
            registry.len(),
            client.name()
        );

        Ok(Agent {
            id: self.id,
            name,
            description: self.config.description,
            role: self.config.role,
            goals: self.config.goals,
            settings: self.config.model,
            client,
            bus,
            invoker: self.invoker,
            formatter: self.formatter,
            processor: self.processor,
            generation_hook: self.generation_hook,
            status: Mutex::new(AgentStatus::Idle),
            tools: RwLock::new(registry),
            memory: Mutex::new(memory),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FunctionCall, GenerateContentRequest, LLMError};
    use crate::notification_bus::EventKind;
    use async_trait::async_trait;
    use sdk::tool::FnTool;
    use sdk::types::ToolError;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Model client replaying canned responses and recording requests
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<crate::llm::Result<GenerateContentResponse>>>,
        requests: Mutex<Vec<GenerateContentRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<crate::llm::Result<GenerateContentResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<GenerateContentRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_content(
            &self,
            request: &GenerateContentRequest,
        ) -> crate::llm::Result<GenerateContentResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::ProviderUnavailable("script exhausted".into())))
        }
    }

    fn weather_tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            FunctionDeclaration::new("weather", "Current weather").with_parameters(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}}
            })),
            |input| async move {
                let city = input.param_str("city")?;
                Ok(json!({"city": city, "sky": "clear"}))
            },
        ))
    }

    fn record_events(bus: &NotificationBus) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe("*", move |event| {
            sink.lock().unwrap().push(event.kind());
            Ok(())
        })
        .unwrap();
        seen
    }

    #[test]
    fn test_build_requires_client() {
        let err = Agent::builder("writer").build().unwrap_err();
        assert!(matches!(err, EngineError::MissingModelClient(id) if id == "writer"));
    }

    #[test]
    fn test_build_rejects_zero_history() {
        let err = Agent::builder("writer")
            .client(ScriptedClient::new(vec![]))
            .max_history_length(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_system_instruction_lists_goals() {
        let agent = Agent::builder("writer")
            .role("You write release notes.")
            .goal("Be concise")
            .goal("Mention breaking changes")
            .client(ScriptedClient::new(vec![]))
            .build()
            .unwrap();

        let instruction = agent.system_instruction().unwrap();
        assert_eq!(
            instruction.parts[0].as_text().unwrap(),
            "You write release notes.\n\nYour goals:\n1. Be concise\n2. Mention breaking changes"
        );
        assert_eq!(agent.name(), "writer");
    }

    #[test]
    fn test_generation_config_layering() {
        let mut overrides = Map::new();
        overrides.insert("topP".to_string(), json!(0.9));
        let agent = Agent::builder("a")
            .settings(ModelSettings {
                temperature: Some(0.2),
                max_output_tokens: None,
                overrides,
            })
            .generation_hook(Arc::new(|config: &mut GenerationConfig| {
                config.max_output_tokens = 256;
            }))
            .client(ScriptedClient::new(vec![]))
            .build()
            .unwrap();

        let config = agent.generation_config();
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_output_tokens, 256);
        assert_eq!(config.extra.get("topP"), Some(&json!(0.9)));
    }

    #[tokio::test]
    async fn test_run_without_tool_calls() {
        let client = ScriptedClient::new(vec![Ok(GenerateContentResponse::from_text("Hi there"))]);
        let bus = NotificationBus::new();
        let seen = record_events(&bus);
        let agent = Agent::builder("greeter")
            .client(client.clone())
            .bus(bus)
            .build()
            .unwrap();

        let reply = agent.run(json!("Hello"), &RunContext::new()).await.unwrap();

        assert_eq!(reply, "Hi there");
        assert_eq!(client.requests().len(), 1);
        assert!(client.requests()[0].tools.is_none());
        assert_eq!(agent.history(None).len(), 1);
        assert_eq!(agent.history(None)[0].response, "Hi there");
        assert!(agent.history(None)[0].timestamp.is_some());
        assert_eq!(agent.status(), AgentStatus::Idle);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                EventKind::StatusChanged,
                EventKind::RunStarted,
                EventKind::InputFormatted,
                EventKind::LlmResponseReceived,
                EventKind::HistoryUpdated,
                EventKind::StatusChanged,
                EventKind::RunCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_run_with_tool_call_makes_two_model_calls() {
        let client = ScriptedClient::new(vec![
            Ok(GenerateContentResponse::from_function_calls(vec![FunctionCall::new(
                "weather",
                json!({"city": "Oslo"}),
            )])),
            Ok(GenerateContentResponse::from_text("It is clear in Oslo")),
        ]);
        let agent = Agent::builder("forecaster")
            .client(client.clone())
            .tool(weather_tool())
            .build()
            .unwrap();

        let reply = agent
            .run(json!("Weather in Oslo?"), &RunContext::new())
            .await
            .unwrap();
        assert_eq!(reply, "It is clear in Oslo");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.as_ref().unwrap()[0].function_declarations.len(), 1);

        let follow_up = &requests[1].contents;
        assert_eq!(follow_up.len(), 3);
        assert_eq!(follow_up[1].role, Some(crate::llm::Role::Model));
        let response = follow_up[2].parts[0]
            .as_function_response()
            .expect("Expected function response");
        assert_eq!(response.name, "weather");
        assert_eq!(
            response.response,
            json!({"result": {"city": "Oslo", "sky": "clear"}})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_failure_is_reported_to_model() {
        let failing: Arc<dyn Tool> = Arc::new(FnTool::new(
            FunctionDeclaration::new("flaky", "Always fails"),
            |_| async { Err(ToolError::Execution("service down".to_string())) },
        ));
        let client = ScriptedClient::new(vec![
            Ok(GenerateContentResponse::from_function_calls(vec![FunctionCall::new(
                "flaky",
                json!({}),
            )])),
            Ok(GenerateContentResponse::from_text("The tool is unavailable")),
        ]);
        let agent = Agent::builder("a")
            .client(client.clone())
            .tool(failing)
            .build()
            .unwrap();

        let reply = agent.run(json!("go"), &RunContext::new()).await.unwrap();
        assert_eq!(reply, "The tool is unavailable");

        let follow_up = &client.requests()[1].contents;
        let response = follow_up[2].parts[0]
            .as_function_response()
            .expect("Expected function response");
        assert!(response.response["error"]
            .as_str()
            .unwrap()
            .contains("service down"));
    }

    #[tokio::test]
    async fn test_model_failure_sets_error_status() {
        let client = ScriptedClient::new(vec![Err(LLMError::RateLimitExceeded)]);
        let bus = NotificationBus::new();
        let seen = record_events(&bus);
        let agent = Agent::builder("a").client(client).bus(bus).build().unwrap();

        let err = agent.run(json!("hi"), &RunContext::new()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::LLMProvider(_))
        ));
        assert_eq!(agent.status(), AgentStatus::Error);
        assert!(agent.history(None).is_empty());
        assert_eq!(seen.lock().unwrap().last(), Some(&EventKind::RunError));
    }

    #[test]
    fn test_add_and_remove_tool_emit_events() {
        let bus = NotificationBus::new();
        let seen = record_events(&bus);
        let agent = Agent::builder("a")
            .client(ScriptedClient::new(vec![]))
            .bus(bus)
            .build()
            .unwrap();

        agent.add_tool(weather_tool()).unwrap();
        assert_eq!(agent.tool_names(), vec!["weather"]);
        assert_eq!(agent.declarations().len(), 1);

        assert!(agent.remove_tool("weather"));
        assert!(!agent.remove_tool("weather"));
        assert!(agent.declarations().is_empty());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::ToolAdded, EventKind::ToolRemoved]
        );
    }

    #[test]
    fn test_add_invalid_tool_rejected() {
        let agent = Agent::builder("a")
            .client(ScriptedClient::new(vec![]))
            .build()
            .unwrap();
        let nameless: Arc<dyn Tool> = Arc::new(FnTool::new(
            FunctionDeclaration::new("", "no name"),
            |_| async { Ok(json!(null)) },
        ));

        assert!(matches!(
            agent.add_tool(nameless),
            Err(EngineError::InvalidTool(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_formatter_sees_context() {
        let client = ScriptedClient::new(vec![Ok(GenerateContentResponse::from_text("ok"))]);
        let formatter = |input: &Value, ctx: &RunContext| -> Result<Vec<Content>> {
            Ok(vec![Content::user(format!(
                "[{}] {}",
                ctx.job_id.clone().unwrap_or_default(),
                input
            ))])
        };
        let agent = Agent::builder("a")
            .client(client.clone())
            .formatter(Arc::new(formatter))
            .build()
            .unwrap();

        let ctx = RunContext::for_job("exec-1", "summarize", Map::new());
        agent.run(json!(1), &ctx).await.unwrap();

        assert_eq!(
            client.requests()[0].contents[0].parts[0].as_text(),
            Some("[summarize] 1")
        );
    }
}
