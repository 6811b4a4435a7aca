//! Sequential and parallel workflow steps

use serde::{Deserialize, Serialize};

/// One step of a workflow
///
/// A bare job id runs on its own; `{"type": "parallel", "jobs": [...]}` runs
/// its jobs concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Job(String),
    Parallel {
        #[serde(rename = "type")]
        kind: ParallelKind,
        jobs: Vec<String>,
    },
}

/// Tag of a parallel step; only `"parallel"` is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelKind {
    Parallel,
}

impl Step {
    pub fn job(id: impl Into<String>) -> Self {
        Step::Job(id.into())
    }

    pub fn parallel<I, S>(jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::Parallel {
            kind: ParallelKind::Parallel,
            jobs: jobs.into_iter().map(Into::into).collect(),
        }
    }

    /// Job ids of this step, in declaration order
    pub fn job_ids(&self) -> &[String] {
        match self {
            Step::Job(id) => std::slice::from_ref(id),
            Step::Parallel { jobs, .. } => jobs,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Step::Parallel { .. })
    }
}
