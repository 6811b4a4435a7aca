//! Agency records
//!
//! An agency file is a JSON document with camelCase keys:
//!
//! ```json
//! {
//!   "agency": {"name": "Research Desk", "description": "..."},
//!   "agents": {"researcher": {"name": "Researcher", "role": "...", "goals": ["..."], "tools": ["http_get"]}},
//!   "team": {"desk": {"agents": ["researcher"], "jobs": {"gather": {"agent": "researcher", "input": "brief.topic"}}, "workflow": ["gather"]}},
//!   "brief": {"topic": "tokio"},
//!   "workflows": {"daily": {"steps": ["gather"]}},
//!   "jobSchemas": {},
//!   "errorHandlers": {"gather": "continue"},
//!   "workflowErrorHandlers": {"daily": {"fallback": null}}
//! }
//! ```

use crate::llm::GenerationConfig;
use crate::workflow::Step;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Complete agency record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyConfig {
    #[serde(default)]
    pub agency: AgencyInfo,

    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,

    /// Teams by id
    #[serde(default)]
    pub team: BTreeMap<String, TeamConfig>,

    /// Shared values every job input can reference as `brief.<key>`
    #[serde(default)]
    pub brief: Map<String, Value>,

    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowConfig>,

    #[serde(default)]
    pub job_schemas: BTreeMap<String, JobSchema>,

    /// Failure policy per job id
    #[serde(default)]
    pub error_handlers: BTreeMap<String, ErrorPolicyConfig>,

    /// Failure policy per workflow id
    #[serde(default)]
    pub workflow_error_handlers: BTreeMap<String, ErrorPolicyConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgencyInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

/// One agent definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Role prompt, first part of the system instruction
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub goals: Vec<String>,

    /// Tool names, resolved against registered and built-in tools
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_length: Option<usize>,
}

/// Per-agent sampling settings
///
/// Unset fields fall back to the engine defaults. `overrides` are passed to
/// the provider verbatim as extra generation config fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub overrides: Map<String, Value>,
}

impl ModelSettings {
    /// Settings where unset fields of `self` are taken from `base`
    pub fn layered_over(&self, base: &ModelSettings) -> ModelSettings {
        let mut overrides = base.overrides.clone();
        overrides.extend(self.overrides.clone());

        ModelSettings {
            temperature: self.temperature.or(base.temperature),
            max_output_tokens: self.max_output_tokens.or(base.max_output_tokens),
            overrides,
        }
    }

    /// Apply these settings on top of a generation config
    ///
    /// Override keys naming typed fields (`temperature`, `maxOutputTokens`)
    /// update those fields instead of being duplicated into the extras.
    pub fn apply(&self, config: &mut GenerationConfig) {
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_output_tokens) = self.max_output_tokens {
            config.max_output_tokens = max_output_tokens;
        }

        for (key, value) in &self.overrides {
            match key.as_str() {
                "temperature" => {
                    if let Some(t) = value.as_f64() {
                        config.temperature = t;
                    }
                }
                "maxOutputTokens" => {
                    if let Some(n) = value.as_u64().and_then(|n| u32::try_from(n).ok()) {
                        config.max_output_tokens = n;
                    }
                }
                _ => {
                    config.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// One team definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Agent ids belonging to the team
    #[serde(default)]
    pub agents: Vec<String>,

    #[serde(default)]
    pub jobs: BTreeMap<String, JobConfig>,

    /// The team's own workflow
    #[serde(default)]
    pub workflow: Vec<Step>,
}

/// One job definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Id of the agent running the job
    pub agent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input template, see `workflow::reference`
    #[serde(default)]
    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Named workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub steps: Vec<Step>,
}

/// Input/output contract of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Declarative failure policy: `"continue"`, `"abort"` or `{"fallback": value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicyConfig {
    Continue,
    Abort,
    Fallback(Value),
}

impl AgencyConfig {
    /// Load an agency record from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read agency file {:?}: {}", path, e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse an agency record from JSON text
    pub fn from_json_str(contents: &str) -> Result<Self, EngineError> {
        serde_json::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse agency config: {}", e)))
    }

    /// Team id owning `job_id`, searching teams in id order
    pub fn team_of_job(&self, job_id: &str) -> Option<&str> {
        self.team
            .iter()
            .find(|(_, team)| team.jobs.contains_key(job_id))
            .map(|(id, _)| id.as_str())
    }
}
