//! Step-walking workflow executor
//!
//! Steps run strictly in order. A sequential step runs its job alone; a
//! parallel step resolves every member's input from the outputs collected so
//! far, then runs all members concurrently and waits for all of them to
//! settle. A failing job never cancels its siblings.
//!
//! Failures go through handler resolution: the job's handler, else the
//! workflow's handler, else abort. An abort lets the current step finish and
//! skips every later step.

use super::handler::{Recovery, SharedHandler};
use super::reference::Scope;
use super::report::{JobFailure, JobOutcome, WorkflowReport, WorkflowStatus};
use super::schema;
use super::step::Step;
use super::validation::validate_workflow;
use crate::agent::{Agent, RunContext};
use crate::config::JobSchema;
use crate::notification_bus::{Event, NotificationBus};
use crate::team::JobDefinition;
use anyhow::Context;
use futures::future::join_all;
use sdk::errors::EngineError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of looking up a job by id
#[derive(Debug)]
pub enum JobLookup<'a> {
    Found {
        job: &'a JobDefinition,
        agent: &'a Arc<Agent>,
    },
    /// The job exists but was skipped because its agent is missing
    Skipped { agent_id: &'a str },
    Missing,
}

/// Anything that can map job ids to jobs and their agents
pub trait JobSource: Send + Sync {
    fn find_job(&self, job_id: &str) -> JobLookup<'_>;
}

/// Per-execution options
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Timeout for jobs that don't declare their own
    pub job_timeout: Option<Duration>,

    /// Values layered over the brief for this execution only
    pub brief_overrides: Map<String, Value>,
}

impl ExecuteOptions {
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    pub fn with_brief_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.brief_overrides.insert(key.into(), value);
        self
    }
}

/// Everything needed to execute one workflow
pub struct WorkflowExecutor<'a> {
    pub workflow_id: &'a str,
    pub steps: &'a [Step],
    pub brief: &'a Map<String, Value>,
    pub jobs: &'a dyn JobSource,
    pub schemas: &'a BTreeMap<String, JobSchema>,
    pub job_handlers: &'a HashMap<String, SharedHandler>,
    pub workflow_handler: Option<&'a SharedHandler>,
    pub bus: &'a NotificationBus,
}

struct Collected {
    outputs: HashMap<String, Value>,
    failed: HashSet<String>,
    outcomes: BTreeMap<String, JobOutcome>,
}

impl<'a> WorkflowExecutor<'a> {
    /// Validate, then run every step
    ///
    /// `context` is handed to each agent run as `RunContext::values`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails; nothing runs in
    /// that case. Job failures are reported in the `WorkflowReport`, not as
    /// errors.
    pub async fn execute(
        &self,
        context: Map<String, Value>,
        options: &ExecuteOptions,
    ) -> Result<WorkflowReport, EngineError> {
        let mut brief = self.brief.clone();
        brief.extend(options.brief_overrides.clone());

        validate_workflow(self.workflow_id, self.steps, self.jobs, &brief)?;

        let execution_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(
            "Starting workflow {} (execution {})",
            self.workflow_id, execution_id
        );
        self.bus.emit(Event::WorkflowStarted {
            execution_id: execution_id.clone(),
            workflow_id: self.workflow_id.to_string(),
        });

        let mut collected = Collected {
            outputs: HashMap::new(),
            failed: HashSet::new(),
            outcomes: BTreeMap::new(),
        };
        let mut aborted_by: Option<JobFailure> = None;

        for (index, step) in self.steps.iter().enumerate() {
            debug!(
                "Workflow {} step {}: {:?}",
                self.workflow_id,
                index,
                step.job_ids()
            );

            let scope = Scope {
                brief: &brief,
                outputs: &collected.outputs,
                failed: &collected.failed,
            };
            let runs = step.job_ids().iter().map(|job_id| {
                self.run_job(&execution_id, job_id, scope, &context, options)
            });
            let results = join_all(runs).await;

            for (job_id, result) in step.job_ids().iter().zip(results) {
                match result {
                    Ok(output) => {
                        collected.outputs.insert(job_id.clone(), output.clone());
                        collected
                            .outcomes
                            .insert(job_id.clone(), JobOutcome::Succeeded { output });
                    }
                    Err(cause) => {
                        let failure = JobFailure {
                            workflow_id: self.workflow_id.to_string(),
                            job_id: job_id.clone(),
                            step: index,
                            cause,
                        };
                        match self.recover(&failure) {
                            Recovery::Continue => {
                                collected.failed.insert(job_id.clone());
                                collected.outcomes.insert(
                                    job_id.clone(),
                                    JobOutcome::Failed {
                                        error: failure.cause,
                                    },
                                );
                            }
                            Recovery::Fallback(output) => {
                                debug!("Job {} recovered with fallback output", job_id);
                                collected.outputs.insert(job_id.clone(), output.clone());
                                collected.outcomes.insert(
                                    job_id.clone(),
                                    JobOutcome::Recovered {
                                        output,
                                        error: failure.cause,
                                    },
                                );
                            }
                            Recovery::Abort => {
                                collected.failed.insert(job_id.clone());
                                collected.outcomes.insert(
                                    job_id.clone(),
                                    JobOutcome::Failed {
                                        error: failure.cause.clone(),
                                    },
                                );
                                aborted_by.get_or_insert(failure);
                            }
                        }
                    }
                }
            }

            if aborted_by.is_some() {
                warn!(
                    "Workflow {} aborted after step {}",
                    self.workflow_id, index
                );
                break;
            }
        }

        let status = if aborted_by.is_some() {
            WorkflowStatus::Aborted
        } else if collected.outcomes.values().all(JobOutcome::is_success) {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::CompletedWithErrors
        };

        self.bus.emit(Event::WorkflowCompleted {
            execution_id: execution_id.clone(),
            workflow_id: self.workflow_id.to_string(),
            status,
        });

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Workflow {} {} in {}ms",
            self.workflow_id, status, elapsed_ms
        );

        Ok(WorkflowReport {
            execution_id,
            workflow_id: self.workflow_id.to_string(),
            status,
            jobs: collected.outcomes,
            aborted_by,
            elapsed_ms,
        })
    }

    /// Run one job and announce how it settled
    ///
    /// `jobCompleted` / `jobFailed` fire as soon as this job settles, even
    /// while parallel siblings are still running.
    async fn run_job(
        &self,
        execution_id: &str,
        job_id: &str,
        scope: Scope<'_>,
        context: &Map<String, Value>,
        options: &ExecuteOptions,
    ) -> Result<Value, String> {
        match self
            .attempt_job(execution_id, job_id, scope, context, options)
            .await
        {
            Ok(output) => {
                self.bus.emit(Event::JobCompleted {
                    execution_id: execution_id.to_string(),
                    job_id: job_id.to_string(),
                });
                Ok(output)
            }
            Err(e) => {
                let cause = format!("{:#}", e);
                warn!("Job {} failed: {}", job_id, cause);
                self.bus.emit(Event::JobFailed {
                    execution_id: execution_id.to_string(),
                    job_id: job_id.to_string(),
                    error: cause.clone(),
                });
                Err(cause)
            }
        }
    }

    async fn attempt_job(
        &self,
        execution_id: &str,
        job_id: &str,
        scope: Scope<'_>,
        context: &Map<String, Value>,
        options: &ExecuteOptions,
    ) -> anyhow::Result<Value> {
        let (job, agent) = match self.jobs.find_job(job_id) {
            JobLookup::Found { job, agent } => (job, agent),
            _ => return Err(EngineError::UnknownJob(job_id.to_string()).into()),
        };
        let contract = self.schemas.get(job_id);

        let input = scope.resolve(job_id, &job.input)?;
        if let Some(input_schema) = contract.and_then(|c| c.input.as_ref()) {
            schema::check(input_schema, &input)
                .map_err(|reason| schema_violation(job_id, "input", reason))?;
        }

        self.bus.emit(Event::JobStarted {
            execution_id: execution_id.to_string(),
            job_id: job_id.to_string(),
            agent_id: agent.id().to_string(),
        });

        let run_context = RunContext::for_job(execution_id, job_id, context.clone());
        let text = match job.timeout.or(options.job_timeout) {
            Some(limit) => tokio::time::timeout(limit, agent.run(input, &run_context))
                .await
                .map_err(|_| EngineError::JobTimeout {
                    job_id: job_id.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => agent.run(input, &run_context).await,
        }
        .with_context(|| format!("Agent {} failed", agent.id()))?;

        let Some(output_schema) = contract.and_then(|c| c.output.as_ref()) else {
            return Ok(Value::String(text));
        };

        let output = if schema::expects_structured(output_schema) {
            serde_json::from_str(&text).map_err(|e| {
                schema_violation(job_id, "output", format!("not valid JSON: {}", e))
            })?
        } else {
            Value::String(text)
        };
        schema::check(output_schema, &output)
            .map_err(|reason| schema_violation(job_id, "output", reason))?;
        Ok(output)
    }

    fn recover(&self, failure: &JobFailure) -> Recovery {
        if let Some(handler) = self.job_handlers.get(&failure.job_id) {
            return handler.handle(failure);
        }
        if let Some(handler) = self.workflow_handler {
            return handler.handle(failure);
        }
        Recovery::Abort
    }
}

fn schema_violation(job_id: &str, direction: &str, reason: String) -> EngineError {
    EngineError::SchemaViolation {
        job_id: job_id.to_string(),
        direction: direction.to_string(),
        reason,
    }
}
