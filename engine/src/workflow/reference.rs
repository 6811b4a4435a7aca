//! Job input references
//!
//! A job's input is a JSON template. String leaves are parsed as references:
//!
//! - `brief` resolves to the whole brief;
//! - `brief.<key>(.<segment>)*` resolves to a brief value, then nested keys;
//! - `jobs.<job_id>.output(.<segment>)*` resolves to the output of a job from
//!   an earlier step, then nested keys.
//!
//! Segments are `[A-Za-z0-9_-]+`; numeric segments index arrays. Every other
//! string, and every non-string value, is a literal.

use regex::Regex;
use sdk::errors::EngineError;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

static BRIEF_PATTERN: OnceLock<Regex> = OnceLock::new();
static JOB_PATTERN: OnceLock<Regex> = OnceLock::new();

fn brief_pattern() -> &'static Regex {
    BRIEF_PATTERN.get_or_init(|| {
        Regex::new(r"^brief\.([A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)*)$")
            .expect("Invalid brief reference pattern")
    })
}

fn job_pattern() -> &'static Regex {
    JOB_PATTERN.get_or_init(|| {
        Regex::new(r"^jobs\.([A-Za-z0-9_-]+)\.output((?:\.[A-Za-z0-9_-]+)*)$")
            .expect("Invalid job reference pattern")
    })
}

/// A parsed reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Path into the brief; empty for the whole brief
    Brief { path: Vec<String> },
    /// Path into a job's output
    JobOutput { job_id: String, path: Vec<String> },
}

impl Reference {
    /// Parse a string leaf. Returns `None` for literals.
    pub fn parse(text: &str) -> Option<Self> {
        if text == "brief" {
            return Some(Reference::Brief { path: Vec::new() });
        }

        if let Some(caps) = brief_pattern().captures(text) {
            return Some(Reference::Brief {
                path: split_segments(&caps[1]),
            });
        }

        job_pattern().captures(text).map(|caps| Reference::JobOutput {
            job_id: caps[1].to_string(),
            path: split_segments(&caps[2]),
        })
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// All references in a template, depth first
pub fn references(template: &Value) -> Vec<(String, Reference)> {
    let mut found = Vec::new();
    collect(template, &mut found);
    found
}

fn collect(value: &Value, found: &mut Vec<(String, Reference)>) {
    match value {
        Value::String(text) => {
            if let Some(reference) = Reference::parse(text) {
                found.push((text.clone(), reference));
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect(item, found)),
        _ => {}
    }
}

/// Values a template can be resolved against
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub brief: &'a Map<String, Value>,
    /// Outputs of completed (or recovered) jobs
    pub outputs: &'a HashMap<String, Value>,
    /// Jobs that failed without a recorded output
    pub failed: &'a HashSet<String>,
}

impl<'a> Scope<'a> {
    /// Resolve every reference of `template` for job `job_id`
    ///
    /// # Errors
    ///
    /// - `InvalidReference` for a missing brief key or path
    /// - `ForwardReference` for a job with no output yet
    /// - `UpstreamFailed` for a job that failed
    pub fn resolve(&self, job_id: &str, template: &Value) -> Result<Value, EngineError> {
        match template {
            Value::String(text) => match Reference::parse(text) {
                Some(reference) => self.lookup(job_id, text, &reference),
                None => Ok(template.clone()),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(job_id, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.resolve(job_id, item)?)))
                .collect::<Result<Map<_, _>, EngineError>>()
                .map(Value::Object),
            literal => Ok(literal.clone()),
        }
    }

    fn lookup(&self, job_id: &str, text: &str, reference: &Reference) -> Result<Value, EngineError> {
        let invalid = |reason: String| EngineError::InvalidReference {
            job_id: job_id.to_string(),
            reference: text.to_string(),
            reason,
        };

        match reference {
            Reference::Brief { path } => {
                let Some((key, rest)) = path.split_first() else {
                    return Ok(Value::Object(self.brief.clone()));
                };
                let root = self
                    .brief
                    .get(key)
                    .ok_or_else(|| invalid(format!("brief has no key '{}'", key)))?;
                navigate(root, rest).map_err(invalid)
            }
            Reference::JobOutput { job_id: target, path } => {
                if self.failed.contains(target) {
                    return Err(EngineError::UpstreamFailed {
                        job_id: job_id.to_string(),
                        upstream: target.clone(),
                    });
                }
                let output = self.outputs.get(target).ok_or_else(|| {
                    EngineError::ForwardReference {
                        job_id: job_id.to_string(),
                        target: target.clone(),
                    }
                })?;

                match output {
                    Value::String(raw) if !path.is_empty() => {
                        let parsed: Value = serde_json::from_str(raw).map_err(|_| {
                            invalid(format!("output of '{}' is text, not JSON", target))
                        })?;
                        navigate(&parsed, path).map_err(invalid)
                    }
                    other => navigate(other, path).map_err(invalid),
                }
            }
        }
    }
}

/// Follow `path` into `value`
fn navigate(value: &Value, path: &[String]) -> Result<Value, String> {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| format!("no key '{}'", segment))?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| format!("'{}' is not an array index", segment))?;
                items
                    .get(index)
                    .ok_or_else(|| format!("index {} out of bounds ({} items)", index, items.len()))?
            }
            other => {
                return Err(format!(
                    "cannot read '{}' from {}",
                    segment,
                    type_name(other)
                ))
            }
        };
    }
    Ok(current.clone())
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brief() -> Map<String, Value> {
        json!({
            "topic": "tokio",
            "limits": {"words": 300, "sources": ["a", "b"]}
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_parse_grammar() {
        assert_eq!(
            Reference::parse("brief"),
            Some(Reference::Brief { path: vec![] })
        );
        assert_eq!(
            Reference::parse("brief.limits.words"),
            Some(Reference::Brief {
                path: vec!["limits".into(), "words".into()]
            })
        );
        assert_eq!(
            Reference::parse("jobs.gather-1.output"),
            Some(Reference::JobOutput {
                job_id: "gather-1".into(),
                path: vec![]
            })
        );
        assert_eq!(
            Reference::parse("jobs.gather.output.items.0"),
            Some(Reference::JobOutput {
                job_id: "gather".into(),
                path: vec!["items".into(), "0".into()]
            })
        );

        for literal in ["briefing", "brief.", "jobs.x", "jobs.x.result", "see brief.topic", ""] {
            assert_eq!(Reference::parse(literal), None, "{literal}");
        }
    }

    #[test]
    fn test_resolve_nested_template() {
        let brief = brief();
        let mut outputs = HashMap::new();
        outputs.insert("gather".to_string(), json!("raw notes"));
        let failed = HashSet::new();
        let scope = Scope {
            brief: &brief,
            outputs: &outputs,
            failed: &failed,
        };

        let resolved = scope
            .resolve(
                "write",
                &json!({
                    "topic": "brief.topic",
                    "source": "brief.limits.sources.1",
                    "notes": ["jobs.gather.output", 42, "plain text"]
                }),
            )
            .unwrap();

        assert_eq!(
            resolved,
            json!({
                "topic": "tokio",
                "source": "b",
                "notes": ["raw notes", 42, "plain text"]
            })
        );
    }

    #[test]
    fn test_whole_brief() {
        let brief = brief();
        let outputs = HashMap::new();
        let failed = HashSet::new();
        let scope = Scope {
            brief: &brief,
            outputs: &outputs,
            failed: &failed,
        };

        assert_eq!(
            scope.resolve("j", &json!("brief")).unwrap(),
            Value::Object(brief.clone())
        );
    }

    #[test]
    fn test_missing_brief_key() {
        let brief = brief();
        let outputs = HashMap::new();
        let failed = HashSet::new();
        let scope = Scope {
            brief: &brief,
            outputs: &outputs,
            failed: &failed,
        };

        let err = scope.resolve("j", &json!("brief.audience")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidReference { .. }));

        let err = scope.resolve("j", &json!("brief.limits.sources.9")).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_job_output_states() {
        let brief = Map::new();
        let mut outputs = HashMap::new();
        outputs.insert("structured".to_string(), json!("{\"items\": [\"x\"]}"));
        outputs.insert("fallback".to_string(), json!({"score": 7}));
        let mut failed = HashSet::new();
        failed.insert("broken".to_string());
        let scope = Scope {
            brief: &brief,
            outputs: &outputs,
            failed: &failed,
        };

        assert_eq!(
            scope.resolve("j", &json!("jobs.structured.output.items.0")).unwrap(),
            json!("x")
        );
        assert_eq!(
            scope.resolve("j", &json!("jobs.fallback.output.score")).unwrap(),
            json!(7)
        );
        assert!(matches!(
            scope.resolve("j", &json!("jobs.broken.output")).unwrap_err(),
            EngineError::UpstreamFailed { .. }
        ));
        assert!(matches!(
            scope.resolve("j", &json!("jobs.later.output")).unwrap_err(),
            EngineError::ForwardReference { .. }
        ));
    }

    #[test]
    fn test_text_output_with_path_is_invalid() {
        let brief = Map::new();
        let mut outputs = HashMap::new();
        outputs.insert("prose".to_string(), json!("just words"));
        let failed = HashSet::new();
        let scope = Scope {
            brief: &brief,
            outputs: &outputs,
            failed: &failed,
        };

        let err = scope.resolve("j", &json!("jobs.prose.output.title")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidReference { .. }));
    }

    #[test]
    fn test_references_collects_all_leaves() {
        let refs = references(&json!({
            "a": "brief.topic",
            "b": ["jobs.x.output", {"c": "jobs.y.output.z"}],
            "d": "literal"
        }));

        let targets: Vec<_> = refs
            .iter()
            .filter_map(|(_, r)| match r {
                Reference::JobOutput { job_id, .. } => Some(job_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(refs.len(), 3);
        assert_eq!(targets, vec!["x", "y"]);
    }
}
