//! Recovery policies for failed jobs

use super::report::JobFailure;
use crate::config::ErrorPolicyConfig;
use serde_json::Value;
use std::sync::Arc;

/// What to do after a job failed
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Record the error and keep running later steps
    Continue,
    /// Record this value as the job's output and keep running
    Fallback(Value),
    /// Stop after the current step
    Abort,
}

/// Decides how a workflow proceeds after a job failure
///
/// Closures taking `&JobFailure` implement this trait.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, failure: &JobFailure) -> Recovery;
}

impl<F> ErrorHandler for F
where
    F: Fn(&JobFailure) -> Recovery + Send + Sync,
{
    fn handle(&self, failure: &JobFailure) -> Recovery {
        self(failure)
    }
}

/// Handler built from a declarative policy in the agency record
#[derive(Debug, Clone)]
pub struct PolicyHandler(pub ErrorPolicyConfig);

impl ErrorHandler for PolicyHandler {
    fn handle(&self, _failure: &JobFailure) -> Recovery {
        match &self.0 {
            ErrorPolicyConfig::Continue => Recovery::Continue,
            ErrorPolicyConfig::Abort => Recovery::Abort,
            ErrorPolicyConfig::Fallback(value) => Recovery::Fallback(value.clone()),
        }
    }
}

pub type SharedHandler = Arc<dyn ErrorHandler>;
