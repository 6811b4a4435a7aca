//! Workflow engine
//!
//! A workflow is an ordered list of [`Step`]s. Jobs read the brief and the
//! outputs of jobs from earlier steps through references in their input
//! templates (see [`reference`]). Workflows are validated in full before the
//! first job runs, then executed step by step by [`WorkflowExecutor`].

pub mod executor;
pub mod handler;
pub mod reference;
pub mod report;
pub mod schema;
pub mod step;
pub mod validation;

pub use executor::{ExecuteOptions, JobLookup, JobSource, WorkflowExecutor};
pub use handler::{ErrorHandler, PolicyHandler, Recovery, SharedHandler};
pub use reference::Reference;
pub use report::{JobFailure, JobOutcome, WorkflowReport, WorkflowStatus};
pub use step::Step;
pub use validation::validate_workflow;
