use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Overall result of a workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowStatus {
    /// Every job succeeded
    Completed,
    /// All steps ran, but some jobs failed or were recovered by a handler
    CompletedWithErrors,
    /// A job failure stopped the workflow
    Aborted,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::CompletedWithErrors => write!(f, "completed with errors"),
            WorkflowStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Final state of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum JobOutcome {
    Succeeded { output: Value },
    /// The job failed and a handler supplied a fallback output
    Recovered { output: Value, error: String },
    Failed { error: String },
}

impl JobOutcome {
    /// Output usable by later jobs, if any
    pub fn output(&self) -> Option<&Value> {
        match self {
            JobOutcome::Succeeded { output } | JobOutcome::Recovered { output, .. } => Some(output),
            JobOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobOutcome::Succeeded { .. } => None,
            JobOutcome::Recovered { error, .. } | JobOutcome::Failed { error } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// A job failure, as seen by error handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub workflow_id: String,
    pub job_id: String,
    /// Zero-based index of the step the job belongs to
    pub step: usize,
    pub cause: String,
}

impl From<JobFailure> for EngineError {
    fn from(failure: JobFailure) -> Self {
        EngineError::JobFailed {
            job_id: failure.job_id,
            step: failure.step,
            cause: failure.cause,
        }
    }
}

/// Everything a workflow execution produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    /// Outcome per executed job id
    pub jobs: BTreeMap<String, JobOutcome>,
    /// The failure that stopped the workflow, when aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_by: Option<JobFailure>,
    pub elapsed_ms: u64,
}

impl WorkflowReport {
    pub fn outcome(&self, job_id: &str) -> Option<&JobOutcome> {
        self.jobs.get(job_id)
    }

    pub fn output(&self, job_id: &str) -> Option<&Value> {
        self.jobs.get(job_id).and_then(JobOutcome::output)
    }

    /// Outputs of all jobs that have one
    pub fn outputs(&self) -> Map<String, Value> {
        self.jobs
            .iter()
            .filter_map(|(id, outcome)| outcome.output().map(|o| (id.clone(), o.clone())))
            .collect()
    }

    /// Turn an aborted report into `EngineError::JobFailed`
    ///
    /// Completed reports, with or without recovered errors, pass through.
    pub fn into_result(self) -> Result<Self, EngineError> {
        match (&self.status, &self.aborted_by) {
            (WorkflowStatus::Aborted, Some(failure)) => Err(failure.clone().into()),
            _ => Ok(self),
        }
    }
}
