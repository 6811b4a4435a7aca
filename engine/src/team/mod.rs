//! Teams
//!
//! A team groups agents, the jobs they run and the team's own workflow.
//! Building a team resolves every job's agent against an already-built
//! [`AgentRegistry`]. Jobs bound to an agent that isn't available are skipped
//! with a warning rather than failing the team; their ids are remembered so a
//! workflow that uses them reports a clear error.

use crate::agent::Agent;
use crate::config::{JobConfig, TeamConfig};
use crate::notification_bus::NotificationBus;
use crate::workflow::{ExecuteOptions, JobLookup, JobSource, Step, WorkflowExecutor, WorkflowReport};
use sdk::errors::EngineError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Agents by id
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent under its own id, replacing any previous one
    pub fn insert(&mut self, agent: Arc<Agent>) -> Option<Arc<Agent>> {
        self.agents.insert(agent.id().to_string(), agent)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Agent>> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.agents.values()
    }
}

/// A resolved job
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinition {
    pub id: String,
    pub agent_id: String,
    pub description: Option<String>,
    /// Input template
    pub input: Value,
    pub timeout: Option<Duration>,
}

impl JobDefinition {
    fn from_config(id: &str, config: &JobConfig) -> Self {
        Self {
            id: id.to_string(),
            agent_id: config.agent.clone(),
            description: config.description.clone(),
            input: config.input.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Named collection of agents, jobs and a workflow
#[derive(Debug, Clone)]
pub struct Team {
    id: String,
    name: String,
    description: String,
    agents: AgentRegistry,
    jobs: BTreeMap<String, JobDefinition>,
    /// Job id -> id of the missing agent
    skipped: BTreeMap<String, String>,
    workflow: Vec<Step>,
}

impl Team {
    /// Build a team from its record
    ///
    /// # Errors
    ///
    /// - `UnknownAgent` if the team lists an agent missing from `registry`
    /// - `Config` if a job has an empty id or agent id
    /// - `UnknownJob` if the team workflow names a job the team doesn't define
    pub fn from_config(
        id: &str,
        config: &TeamConfig,
        registry: &AgentRegistry,
    ) -> Result<Self, EngineError> {
        let mut agents = AgentRegistry::new();
        for agent_id in &config.agents {
            let agent = registry
                .get(agent_id)
                .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
            agents.insert(Arc::clone(agent));
        }

        let mut jobs = BTreeMap::new();
        let mut skipped = BTreeMap::new();
        for (job_id, job) in &config.jobs {
            if job_id.trim().is_empty() {
                return Err(EngineError::Config(format!(
                    "team '{}' has a job with an empty id",
                    id
                )));
            }
            if job.agent.trim().is_empty() {
                return Err(EngineError::Config(format!(
                    "job '{}' in team '{}' has no agent",
                    job_id, id
                )));
            }

            if !agents.contains(&job.agent) {
                warn!(
                    "Skipping job '{}' in team '{}': agent '{}' is not part of the team",
                    job_id, id, job.agent
                );
                skipped.insert(job_id.clone(), job.agent.clone());
                continue;
            }

            jobs.insert(job_id.clone(), JobDefinition::from_config(job_id, job));
        }

        for step in &config.workflow {
            for job_id in step.job_ids() {
                if !jobs.contains_key(job_id) && !skipped.contains_key(job_id) {
                    return Err(EngineError::UnknownJob(format!(
                        "{} (in workflow of team '{}')",
                        job_id, id
                    )));
                }
            }
        }

        debug!(
            "Built team {} with {} agent(s), {} job(s), {} skipped",
            id,
            agents.len(),
            jobs.len(),
            skipped.len()
        );

        Ok(Self {
            id: id.to_string(),
            name: if config.name.is_empty() {
                id.to_string()
            } else {
                config.name.clone()
            },
            description: config.description.clone(),
            agents,
            jobs,
            skipped,
            workflow: config.workflow.clone(),
        })
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

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn job(&self, id: &str) -> Option<&JobDefinition> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.values()
    }

    /// The agent that runs `job_id`
    ///
    /// # Errors
    ///
    /// `UnknownAgent` for a skipped job, `UnknownJob` for an undefined one.
    pub fn agent_for(&self, job_id: &str) -> Result<&Arc<Agent>, EngineError> {
        match self.lookup(job_id) {
            JobLookup::Found { agent, .. } => Ok(agent),
            JobLookup::Skipped { agent_id } => Err(EngineError::UnknownAgent(format!(
                "{} (required by skipped job '{}')",
                agent_id, job_id
            ))),
            JobLookup::Missing => Err(EngineError::UnknownJob(job_id.to_string())),
        }
    }

    pub fn workflow(&self) -> &[Step] {
        &self.workflow
    }

    /// Jobs skipped at build time, with the agent each one was missing
    pub fn skipped_jobs(&self) -> &BTreeMap<String, String> {
        &self.skipped
    }

    /// Run the team's own workflow against `brief`
    ///
    /// Uses no error handlers, so the first failing job aborts the run.
    pub async fn run(
        &self,
        brief: &Map<String, Value>,
        bus: &NotificationBus,
        options: &ExecuteOptions,
    ) -> Result<WorkflowReport, EngineError> {
        let schemas = BTreeMap::new();
        let handlers = HashMap::new();
        let executor = WorkflowExecutor {
            workflow_id: &self.id,
            steps: &self.workflow,
            brief,
            jobs: self,
            schemas: &schemas,
            job_handlers: &handlers,
            workflow_handler: None,
            bus,
        };
        executor.execute(Map::new(), options).await
    }

    fn lookup(&self, job_id: &str) -> JobLookup<'_> {
        if let Some(job) = self.jobs.get(job_id) {
            if let Some(agent) = self.agents.get(&job.agent_id) {
                return JobLookup::Found { job, agent };
            }
        }
        match self.skipped.get(job_id) {
            Some(agent_id) => JobLookup::Skipped { agent_id },
            None => JobLookup::Missing,
        }
    }
}

impl JobSource for Team {
    fn find_job(&self, job_id: &str) -> JobLookup<'_> {
        self.lookup(job_id)
    }
}
