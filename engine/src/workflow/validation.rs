//! Static workflow checks, run before any job starts

use super::executor::{JobLookup, JobSource};
use super::reference::{references, Reference, Scope};
use super::step::Step;
use sdk::errors::EngineError;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Check a workflow against the available jobs and the brief
///
/// # Errors
///
/// - `Config` for an empty workflow or step, a duplicated job, or a job that
///   was skipped when its team was built
/// - `UnknownJob` for a job id no team defines
/// - `AgentReusedInStep` when a parallel step binds one agent twice
/// - `ForwardReference` when a job reads the output of a job that doesn't
///   run in a strictly earlier step
/// - `InvalidReference` when a `brief.*` reference doesn't resolve
pub fn validate_workflow(
    workflow_id: &str,
    steps: &[Step],
    jobs: &dyn JobSource,
    brief: &Map<String, Value>,
) -> Result<(), EngineError> {
    if steps.is_empty() {
        return Err(EngineError::Config(format!(
            "workflow '{}' has no steps",
            workflow_id
        )));
    }

    let mut step_of: HashMap<&str, usize> = HashMap::new();
    for (index, step) in steps.iter().enumerate() {
        if step.job_ids().is_empty() {
            return Err(EngineError::Config(format!(
                "step {} of workflow '{}' has no jobs",
                index, workflow_id
            )));
        }
        for job_id in step.job_ids() {
            if step_of.insert(job_id, index).is_some() {
                return Err(EngineError::Config(format!(
                    "job '{}' appears more than once in workflow '{}'",
                    job_id, workflow_id
                )));
            }
        }
    }

    let no_outputs = HashMap::new();
    let no_failures = HashSet::new();
    let brief_scope = Scope {
        brief,
        outputs: &no_outputs,
        failed: &no_failures,
    };

    for (index, step) in steps.iter().enumerate() {
        let mut agents_in_step = HashSet::new();

        for job_id in step.job_ids() {
            let job = match jobs.find_job(job_id) {
                JobLookup::Found { job, .. } => job,
                JobLookup::Skipped { agent_id } => {
                    return Err(EngineError::Config(format!(
                        "job '{}' was skipped because agent '{}' is not available",
                        job_id, agent_id
                    )))
                }
                JobLookup::Missing => return Err(EngineError::UnknownJob(job_id.clone())),
            };

            if step.is_parallel() && !agents_in_step.insert(job.agent_id.as_str()) {
                return Err(EngineError::AgentReusedInStep {
                    agent_id: job.agent_id.clone(),
                    step: index,
                });
            }

            for (text, reference) in references(&job.input) {
                match reference {
                    Reference::JobOutput { job_id: target, .. } => {
                        let earlier = step_of.get(target.as_str()).is_some_and(|&s| s < index);
                        if !earlier {
                            return Err(EngineError::ForwardReference {
                                job_id: job_id.clone(),
                                target,
                            });
                        }
                    }
                    Reference::Brief { .. } => {
                        brief_scope.resolve(job_id, &Value::String(text))?;
                    }
                }
            }
        }
    }

    Ok(())
}
