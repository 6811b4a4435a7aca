//! Agency
//!
//! The agency is the top-level object built from an [`AgencyConfig`]: it owns
//! every agent and team, the shared brief, the named workflows, job schemas
//! and error handlers, and executes workflows by id.
//!
//! # Examples
//!
//! ```no_run
//! use ensemble_engine::agency::Agency;
//! use ensemble_engine::config::{AgencyConfig, Config};
//! use ensemble_engine::llm::GeminiClient;
//! use ensemble_engine::workflow::ExecuteOptions;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = Config::load_or_create()?;
//! let record = AgencyConfig::load("agency.json".as_ref())?;
//! let client = Arc::new(GeminiClient::from_env(engine.llm.gemini.clone())?);
//!
//! let agency = Agency::builder(record)
//!     .engine_config(&engine)
//!     .client(client)
//!     .build()?;
//! let report = agency
//!     .execute_workflow("daily", Default::default(), &ExecuteOptions::default())
//!     .await?;
//! println!("{}", report.status);
//! # Ok(())
//! # }
//! ```

use crate::agent::{Agent, AgentBuilder};
use crate::config::{AgencyConfig, AgentConfig, Config, JobSchema, ModelSettings, WorkflowConfig};
use crate::llm::ModelClient;
use crate::notification_bus::NotificationBus;
use crate::team::{AgentRegistry, Team};
use crate::tools::{builtin_tool, ToolInvocationManager};
use crate::workflow::{
    validate_workflow, ErrorHandler, ExecuteOptions, JobLookup, JobSource, PolicyHandler,
    SharedHandler, WorkflowExecutor, WorkflowReport,
};
use sdk::errors::EngineError;
use sdk::tool::Tool;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

type ClientFactory =
    Box<dyn Fn(&str, &AgentConfig) -> Result<Arc<dyn ModelClient>, EngineError> + Send + Sync>;

/// Agents, teams and workflows built from one agency record
pub struct Agency {
    name: String,
    description: String,
    agents: AgentRegistry,
    teams: BTreeMap<String, Team>,
    brief: Map<String, Value>,
    workflows: BTreeMap<String, WorkflowConfig>,
    schemas: BTreeMap<String, JobSchema>,
    job_handlers: HashMap<String, SharedHandler>,
    workflow_handlers: HashMap<String, SharedHandler>,
    bus: NotificationBus,
    defaults: ExecuteOptions,
}

impl Agency {
    pub fn builder(config: AgencyConfig) -> AgencyBuilder {
        AgencyBuilder::new(config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn brief(&self) -> &Map<String, Value> {
        &self.brief
    }

    pub fn agent(&self, id: &str) -> Option<&Arc<Agent>> {
        self.agents.get(id)
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.get(id)
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Named workflows with their definitions, by id
    pub fn workflows(&self) -> &BTreeMap<String, WorkflowConfig> {
        &self.workflows
    }

    /// Register a handler for failures of `job_id`
    ///
    /// Replaces a handler declared in the agency record for the same job.
    pub fn on_job_error<H>(&mut self, job_id: impl Into<String>, handler: H)
    where
        H: ErrorHandler + 'static,
    {
        self.job_handlers.insert(job_id.into(), Arc::new(handler));
    }

    /// Register a handler for job failures in `workflow_id` that have no job
    /// handler of their own
    pub fn on_workflow_error<H>(&mut self, workflow_id: impl Into<String>, handler: H)
    where
        H: ErrorHandler + 'static,
    {
        self.workflow_handlers
            .insert(workflow_id.into(), Arc::new(handler));
    }

    /// Check one workflow without running it
    pub fn validate(&self, workflow_id: &str) -> Result<(), EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .ok_or_else(|| EngineError::UnknownWorkflow(workflow_id.to_string()))?;
        validate_workflow(workflow_id, &workflow.steps, self, &self.brief)
    }

    /// Check every named workflow and every team workflow
    ///
    /// Returns the first error found.
    pub fn validate_all(&self) -> Result<(), EngineError> {
        for workflow_id in self.workflows.keys() {
            self.validate(workflow_id)?;
        }
        for team in self.teams.values() {
            if !team.workflow().is_empty() {
                validate_workflow(team.id(), team.workflow(), team, &self.brief)?;
            }
        }
        Ok(())
    }

    /// Execute a named workflow
    ///
    /// `context` is passed to every agent run. Option fields left unset fall
    /// back to the agency defaults taken from the engine configuration.
    ///
    /// # Errors
    ///
    /// `UnknownWorkflow` for an unknown id, and configuration errors when the
    /// workflow fails validation. Job failures are reported in the returned
    /// `WorkflowReport`; use [`WorkflowReport::into_result`] to turn an
    /// aborted report into an error.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        context: Map<String, Value>,
        options: &ExecuteOptions,
    ) -> Result<WorkflowReport, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .ok_or_else(|| EngineError::UnknownWorkflow(workflow_id.to_string()))?;

        let options = self.with_defaults(options);
        let executor = WorkflowExecutor {
            workflow_id,
            steps: &workflow.steps,
            brief: &self.brief,
            jobs: self,
            schemas: &self.schemas,
            job_handlers: &self.job_handlers,
            workflow_handler: self.workflow_handlers.get(workflow_id),
            bus: &self.bus,
        };
        executor.execute(context, &options).await
    }

    /// Execute a team's own workflow against the agency brief
    pub async fn run_team(
        &self,
        team_id: &str,
        options: &ExecuteOptions,
    ) -> Result<WorkflowReport, EngineError> {
        let team = self
            .teams
            .get(team_id)
            .ok_or_else(|| EngineError::Config(format!("Unknown team: {}", team_id)))?;
        team.run(&self.brief, &self.bus, &self.with_defaults(options))
            .await
    }

    fn with_defaults(&self, options: &ExecuteOptions) -> ExecuteOptions {
        let mut merged = options.clone();
        if merged.job_timeout.is_none() {
            merged.job_timeout = self.defaults.job_timeout;
        }
        merged
    }
}

impl JobSource for Agency {
    /// Teams are searched in id order; a defined job wins over a skipped one
    fn find_job(&self, job_id: &str) -> JobLookup<'_> {
        let mut skipped = None;
        for team in self.teams.values() {
            match team.find_job(job_id) {
                found @ JobLookup::Found { .. } => return found,
                JobLookup::Skipped { agent_id } => {
                    skipped.get_or_insert(JobLookup::Skipped { agent_id });
                }
                JobLookup::Missing => {}
            }
        }
        skipped.unwrap_or(JobLookup::Missing)
    }
}

impl std::fmt::Debug for Agency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agency")
            .field("name", &self.name)
            .field("agents", &self.agents.ids())
            .field("teams", &self.teams.keys().collect::<Vec<_>>())
            .field("workflows", &self.workflows.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Agency`]
pub struct AgencyBuilder {
    config: AgencyConfig,
    client: Option<Arc<dyn ModelClient>>,
    client_factory: Option<ClientFactory>,
    tools: HashMap<String, Arc<dyn Tool>>,
    bus: NotificationBus,
    invoker: ToolInvocationManager,
    model_defaults: ModelSettings,
    max_history_length: Option<usize>,
    defaults: ExecuteOptions,
}

impl AgencyBuilder {
    pub fn new(config: AgencyConfig) -> Self {
        Self {
            config,
            client: None,
            client_factory: None,
            tools: HashMap::new(),
            bus: NotificationBus::new(),
            invoker: ToolInvocationManager::default(),
            model_defaults: ModelSettings::default(),
            max_history_length: None,
            defaults: ExecuteOptions::default(),
        }
    }

    /// Apply engine settings: retry policy, sampling defaults, history bound
    /// and default job timeout
    pub fn engine_config(mut self, config: &Config) -> Self {
        self.invoker = config.tool_invoker();
        self.model_defaults = config.model_defaults();
        self.max_history_length = Some(config.memory.max_history_length);
        self.defaults.job_timeout = config.job_timeout();
        self
    }

    /// Model client shared by every agent
    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Per-agent model clients; takes precedence over [`AgencyBuilder::client`]
    pub fn client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str, &AgentConfig) -> Result<Arc<dyn ModelClient>, EngineError>
            + Send
            + Sync
            + 'static,
    {
        self.client_factory = Some(Box::new(factory));
        self
    }

    /// Make a custom tool available to agent records by name
    ///
    /// Custom tools shadow built-in tools of the same name.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn bus(mut self, bus: NotificationBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn invoker(mut self, invoker: ToolInvocationManager) -> Self {
        self.invoker = invoker;
        self
    }

    /// Build every agent and team
    ///
    /// # Errors
    ///
    /// - `MissingModelClient` if an agent gets no client
    /// - `InvalidTool` if an agent names an unknown tool
    /// - team errors from [`Team::from_config`]
    pub fn build(self) -> Result<Agency, EngineError> {
        let mut agents = AgentRegistry::new();
        for (id, agent_config) in &self.config.agents {
            let agent = self.build_agent(id, agent_config)?;
            agents.insert(Arc::new(agent));
        }

        let mut teams = BTreeMap::new();
        for (id, team_config) in &self.config.team {
            teams.insert(id.clone(), Team::from_config(id, team_config, &agents)?);
        }

        let mut job_handlers: HashMap<String, SharedHandler> = HashMap::new();
        for (job_id, policy) in &self.config.error_handlers {
            if self.config.team_of_job(job_id).is_none() {
                warn!("Error handler declared for unknown job '{}'", job_id);
            }
            job_handlers.insert(job_id.clone(), Arc::new(PolicyHandler(policy.clone())));
        }

        let mut workflow_handlers: HashMap<String, SharedHandler> = HashMap::new();
        for (workflow_id, policy) in &self.config.workflow_error_handlers {
            if !self.config.workflows.contains_key(workflow_id) {
                warn!(
                    "Error handler declared for unknown workflow '{}'",
                    workflow_id
                );
            }
            workflow_handlers.insert(workflow_id.clone(), Arc::new(PolicyHandler(policy.clone())));
        }

        info!(
            "Built agency '{}': {} agent(s), {} team(s), {} workflow(s)",
            self.config.agency.name,
            agents.len(),
            teams.len(),
            self.config.workflows.len()
        );

        Ok(Agency {
            name: self.config.agency.name,
            description: self.config.agency.description,
            agents,
            teams,
            brief: self.config.brief,
            workflows: self.config.workflows,
            schemas: self.config.job_schemas,
            job_handlers,
            workflow_handlers,
            bus: self.bus,
            defaults: self.defaults,
        })
    }

    fn build_agent(&self, id: &str, config: &AgentConfig) -> Result<Agent, EngineError> {
        let client = match (&self.client_factory, &self.client) {
            (Some(factory), _) => factory(id, config)?,
            (None, Some(client)) => Arc::clone(client),
            (None, None) => return Err(EngineError::MissingModelClient(id.to_string())),
        };

        let mut builder = AgentBuilder::from_config(id, config)
            .settings(config.model.layered_over(&self.model_defaults))
            .client(client)
            .bus(self.bus.clone())
            .invoker(self.invoker.clone());

        if let Some(max) = config.max_history_length.or(self.max_history_length) {
            builder = builder.max_history_length(max);
        }

        for name in &config.tools {
            let tool = self
                .tools
                .get(name)
                .cloned()
                .or_else(|| builtin_tool(name))
                .ok_or_else(|| {
                    EngineError::InvalidTool(format!(
                        "agent '{}' references unknown tool '{}'",
                        id, name
                    ))
                })?;
            builder = builder.tool(tool);
        }

        debug!("Building agent {}", id);
        builder.build()
    }
}
