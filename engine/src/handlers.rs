//! Command handlers
//!
//! One handler per CLI command. Each prints text or JSON depending on the
//! requested [`OutputFormat`].

use crate::agency::Agency;
use crate::config::{AgencyConfig, Config};
use crate::llm::{GeminiClient, ModelClient};
use crate::workflow::{ExecuteOptions, JobOutcome, WorkflowReport, WorkflowStatus};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Load an agency record and build it against `client`
fn load_agency(path: &Path, config: &Config, client: Arc<dyn ModelClient>) -> Result<Agency> {
    let record = AgencyConfig::load(path)
        .with_context(|| format!("Failed to load agency from {}", path.display()))?;
    Agency::builder(record)
        .engine_config(config)
        .client(client)
        .build()
        .context("Failed to build agency")
}

/// Client for commands that never call the model
///
/// Validation and listing build every agent, so a client is required, but
/// the API key may be absent.
fn offline_client(config: &Config) -> Arc<dyn ModelClient> {
    let key = std::env::var(&config.llm.gemini.api_key_env).unwrap_or_default();
    Arc::new(GeminiClient::new(config.llm.gemini.clone(), key))
}

/// Execute a workflow and print its report
///
/// Exits with an error when the workflow aborted.
pub async fn handle_run(
    agency_path: &Path,
    workflow_id: &str,
    brief: Vec<(String, Value)>,
    context: Vec<(String, Value)>,
    timeout_ms: Option<u64>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let client = GeminiClient::from_env(config.llm.gemini.clone())
        .context("Failed to create model client")?;
    let agency = load_agency(agency_path, config, Arc::new(client))?;

    let mut options = ExecuteOptions::default();
    if let Some(ms) = timeout_ms {
        options = options.with_job_timeout(Duration::from_millis(ms));
    }
    for (key, value) in brief {
        options = options.with_brief_value(key, value);
    }
    let context: Map<String, Value> = context.into_iter().collect();

    if format == OutputFormat::Text {
        println!("Running workflow '{}' of {}", workflow_id, agency.name());
        println!();
    }

    let report = agency
        .execute_workflow(workflow_id, context, &options)
        .await
        .with_context(|| format!("Workflow '{}' could not start", workflow_id))?;

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    report.into_result()?;
    Ok(())
}

fn print_report(report: &WorkflowReport) {
    for (job_id, outcome) in &report.jobs {
        match outcome {
            JobOutcome::Succeeded { output } => {
                println!("✓ {}", job_id);
                println!("{}", render(output));
            }
            JobOutcome::Recovered { output, error } => {
                println!("~ {} (recovered: {})", job_id, error);
                println!("{}", render(output));
            }
            JobOutcome::Failed { error } => println!("✗ {}: {}", job_id, error),
        }
        println!();
    }

    println!(
        "Workflow {} {} in {}ms (execution {})",
        report.workflow_id, report.status, report.elapsed_ms, report.execution_id
    );
    if report.status == WorkflowStatus::Aborted {
        if let Some(failure) = &report.aborted_by {
            println!("Aborted by job '{}' in step {}", failure.job_id, failure.step);
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Validate an agency record and every workflow in it
pub async fn handle_validate(agency_path: &Path, config: &Config, format: OutputFormat) -> Result<()> {
    let agency = load_agency(agency_path, config, offline_client(config))?;
    let result = agency.validate_all();

    match format {
        OutputFormat::Text => match &result {
            Ok(()) => println!(
                "{}: {} agent(s), {} workflow(s), all valid",
                agency.name(),
                agency.agents().len(),
                agency.workflows().len()
            ),
            Err(e) => println!("{}: invalid: {}", agency.name(), e),
        },
        OutputFormat::Json => {
            let output = json!({
                "agency": agency.name(),
                "valid": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    result.context("Agency validation failed")
}

/// List the workflows of an agency
pub async fn handle_workflows(agency_path: &Path, config: &Config, format: OutputFormat) -> Result<()> {
    let agency = load_agency(agency_path, config, offline_client(config))?;

    match format {
        OutputFormat::Text => {
            if agency.workflows().is_empty() {
                println!("No workflows defined in {}", agency.name());
                return Ok(());
            }
            println!("Workflows of {}:", agency.name());
            for (id, workflow) in agency.workflows() {
                match &workflow.description {
                    Some(description) => println!("  {} - {}", id, description),
                    None => println!("  {}", id),
                }
                for (index, step) in workflow.steps.iter().enumerate() {
                    let kind = if step.is_parallel() { "parallel" } else { "job" };
                    println!("    {}. {} {}", index + 1, kind, step.job_ids().join(", "));
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "agency": agency.name(),
                "workflows": agency.workflows(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show the active engine configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", toml::to_string_pretty(config)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}
