//! Integration tests for configuration management
//!
//! Engine settings files on disk, agency records, and how both feed into a
//! built agency.

use async_trait::async_trait;
use ensemble_engine::agency::Agency;
use ensemble_engine::config::{AgencyConfig, Config};
use ensemble_engine::llm::{GenerateContentRequest, GenerateContentResponse, ModelClient};
use sdk::errors::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Quiet;

#[async_trait]
impl ModelClient for Quiet {
    fn name(&self) -> &str {
        "quiet"
    }

    async fn generate_content(
        &self,
        _request: &GenerateContentRequest,
    ) -> ensemble_engine::llm::Result<GenerateContentResponse> {
        Ok(GenerateContentResponse::from_text("ok"))
    }
}

#[test]
fn test_load_or_create_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let created = Config::load_or_create_at(&path).unwrap();
    assert!(path.exists());
    assert_eq!(created.llm.gemini.model, "gemini-2.5-flash");

    let reloaded = Config::load_from_path(&path).unwrap();
    assert_eq!(reloaded.core.log_level, created.core.log_level);
    assert_eq!(reloaded.tools.retry_attempts, created.tools.retry_attempts);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[llm]\nprovider = \"carrier-pigeon\"\n").unwrap();
    let err = Config::load_from_path(&path).unwrap_err();
    assert!(matches!(err, EngineError::Config(msg) if msg.contains("carrier-pigeon")));

    std::fs::write(&path, "[llm\n").unwrap();
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_engine_settings_reach_agents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[llm]
temperature = 0.3
max_output_tokens = 256

[tools]
retry_attempts = 5
retry_delay_ms = 20

[memory]
max_history_length = 7

[workflow]
job_timeout_secs = 45
"#,
    )
    .unwrap();
    let engine = Config::load_from_path(&path).unwrap();
    assert_eq!(engine.job_timeout(), Some(Duration::from_secs(45)));
    assert_eq!(engine.tool_invoker().retry_attempts(), 5);

    let record = AgencyConfig::from_json_str(
        r#"{
            "agency": {"name": "Settings"},
            "agents": {
                "plain": {},
                "tuned": {"model": {"temperature": 1.1}, "maxHistoryLength": 2}
            }
        }"#,
    )
    .unwrap();

    let agency = Agency::builder(record)
        .engine_config(&engine)
        .client(Arc::new(Quiet))
        .build()
        .unwrap();

    let plain = agency.agent("plain").unwrap().generation_config();
    assert_eq!(plain.temperature, 0.3);
    assert_eq!(plain.max_output_tokens, 256);

    let tuned = agency.agent("tuned").unwrap();
    assert_eq!(tuned.generation_config().temperature, 1.1);
    assert_eq!(tuned.generation_config().max_output_tokens, 256);
    assert_eq!(tuned.memory().max_history_length(), 2);
    assert_eq!(agency.agent("plain").unwrap().memory().max_history_length(), 7);
}

#[test]
fn test_agency_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agency.json");
    std::fs::write(
        &path,
        r#"{
            "agency": {"name": "Desk"},
            "agents": {"writer": {"tools": ["current_time"]}},
            "team": {"desk": {"agents": ["writer"], "jobs": {"write": {"agent": "writer", "input": "brief.topic"}}}},
            "brief": {"topic": "rust"},
            "workflows": {"daily": {"steps": ["write"]}},
            "errorHandlers": {"write": {"fallback": "nothing today"}}
        }"#,
    )
    .unwrap();

    let record = AgencyConfig::load(&path).unwrap();
    assert_eq!(record.team_of_job("write"), Some("desk"));

    let agency = Agency::builder(record)
        .client(Arc::new(Quiet))
        .build()
        .unwrap();
    assert_eq!(agency.name(), "Desk");
    assert_eq!(agency.agent("writer").unwrap().tool_names(), vec!["current_time"]);
    assert!(agency.validate_all().is_ok());
}

#[test]
fn test_unknown_tool_fails_build() {
    let record = AgencyConfig::from_json_str(r#"{"agents": {"writer": {"tools": ["teleport"]}}}"#)
        .unwrap();
    let err = Agency::builder(record)
        .client(Arc::new(Quiet))
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTool(msg) if msg.contains("teleport")));
}

#[test]
fn test_missing_client_fails_build() {
    let record = AgencyConfig::from_json_str(r#"{"agents": {"writer": {}}}"#).unwrap();
    let err = Agency::builder(record).build().unwrap_err();
    assert!(matches!(err, EngineError::MissingModelClient(id) if id == "writer"));
}
