//! Configuration management
//!
//! Two kinds of configuration live here:
//!
//! - **Engine settings** (`Config`), stored in TOML at
//!   `~/.ensemble/config.toml` and created with defaults on first use. They
//!   cover logging, the model provider, tool retry policy, memory bounds and
//!   workflow timeouts.
//! - **Agency records** (`AgencyConfig`, see [`agency`]), JSON documents that
//!   describe agents, teams, jobs, workflows and the shared brief.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **llm**: provider, default sampling parameters, Gemini endpoint
//! - **tools**: retry attempts and base delay
//! - **memory**: history bound per agent
//! - **workflow**: optional default job timeout
//!
//! # Examples
//!
//! ```no_run
//! use ensemble_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Model: {}", config.llm.gemini.model);
//! # Ok(())
//! # }
//! ```

pub mod agency;

pub use agency::{
    AgencyConfig, AgencyInfo, AgentConfig, ErrorPolicyConfig, JobConfig, JobSchema,
    ModelSettings, TeamConfig, WorkflowConfig,
};

use crate::tools::ToolInvocationManager;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
///
/// Every section is optional in the file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub llm: LLMConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub workflow: WorkflowSettings,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider used for every agent (currently only "gemini")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Default sampling temperature, overridable per agent
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Default output token limit, overridable per agent
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,
}

/// Tool invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,
}

/// Workflow execution settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Timeout applied to jobs without their own `timeoutMs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_retry_attempts() -> u32 {
    crate::tools::invoker::DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    crate::tools::invoker::DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_max_history_length() -> usize {
    crate::memory::DEFAULT_MAX_HISTORY_LENGTH
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            api_key_env: default_gemini_api_key_env(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: default_max_history_length(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.ensemble/config.toml)
    ///
    /// If the file doesn't exist, a default configuration is written there.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file cannot be read, parsed or
    /// written, or if validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create_at(&config_path)
    }

    /// Load configuration from `path`, creating a default file there if it
    /// doesn't exist yet
    pub fn load_or_create_at(path: &Path) -> Result<Self, EngineError> {
        let path = expand_path(path)?;
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Self::create_default(&path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.ensemble/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".ensemble").join("config.toml"))
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.llm.provider != "gemini" {
            return Err(EngineError::Config(format!(
                "Invalid provider '{}'. Must be one of: gemini",
                self.llm.provider
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EngineError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.llm.max_output_tokens == 0 {
            return Err(EngineError::Config(
                "max_output_tokens must be greater than 0".to_string(),
            ));
        }

        if self.memory.max_history_length == 0 {
            return Err(EngineError::Config(
                "max_history_length must be greater than 0".to_string(),
            ));
        }

        if self.workflow.job_timeout_secs == Some(0) {
            return Err(EngineError::Config(
                "job_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Tool invocation manager using the configured retry policy
    pub fn tool_invoker(&self) -> ToolInvocationManager {
        ToolInvocationManager::new(
            self.tools.retry_attempts,
            Duration::from_millis(self.tools.retry_delay_ms),
        )
    }

    /// Sampling defaults applied to agents that don't set their own
    pub fn model_defaults(&self) -> ModelSettings {
        ModelSettings {
            temperature: Some(self.llm.temperature),
            max_output_tokens: Some(self.llm.max_output_tokens),
            overrides: Default::default(),
        }
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.workflow.job_timeout_secs.map(Duration::from_secs)
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.gemini.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.tools.retry_attempts, 3);
        assert_eq!(config.tools.retry_delay_ms, 1000);
        assert_eq!(config.memory.max_history_length, 100);
        assert!(config.job_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            temperature = 0.2

            [workflow]
            job_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_output_tokens, 1024);
        assert_eq!(config.job_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.llm.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.memory.max_history_length = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.core.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.provider = "carrier-pigeon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = expand_path(&PathBuf::from("~/test")).unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.llm.gemini.model, deserialized.llm.gemini.model);
    }

    #[test]
    fn test_tool_invoker_uses_retry_policy() {
        let mut config = Config::default();
        config.tools.retry_attempts = 5;
        config.tools.retry_delay_ms = 10;

        let invoker = config.tool_invoker();
        assert_eq!(invoker.retry_attempts(), 5);
        assert_eq!(invoker.retry_delay(), Duration::from_millis(10));
    }
}
