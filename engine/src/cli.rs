//! Command-line interface
//!
//! Defines the commands and global flags of the `ensemble` binary with
//! clap's derive API.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// Ensemble agent workflow runner
///
/// Loads an agency record (agents, teams, brief and workflows) and executes
/// its workflows against a language model.
#[derive(Parser, Debug)]
#[command(name = "ensemble")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a workflow
    Run {
        /// Agency record (JSON)
        agency: PathBuf,

        /// Workflow id
        workflow: String,

        /// Override a brief value for this run (KEY=VALUE, VALUE may be JSON)
        #[arg(long = "brief", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        brief: Vec<(String, Value)>,

        /// Add a run context value (KEY=VALUE, VALUE may be JSON)
        #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        context: Vec<(String, Value)>,

        /// Timeout for jobs that don't declare one, in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Validate an agency record and all of its workflows
    Validate {
        /// Agency record (JSON)
        agency: PathBuf,
    },

    /// List the workflows of an agency
    Workflows {
        /// Agency record (JSON)
        agency: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Validate configuration file
    Validate,
}

/// Parse `KEY=VALUE`; VALUE is read as JSON when it parses, else as a string
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
