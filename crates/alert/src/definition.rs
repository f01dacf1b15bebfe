//! Alert job definitions decoded from a stored record's YAML value.
//!
//! ```yaml
//! interval: "*/5 * * * *"
//! search_url: /logs-*/_search
//! search:
//!   query:
//!     range:
//!       "@timestamp": { gte: "now-5m" }
//! process: |
//!   {% if result.total_hits > 0 %}
//!   - type: log
//!     message: "{{ result.total_hits }} hits"
//!   {% endif %}
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use vigil_core::JobRecord;

/// Errors decoding a job definition.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("definition is missing `{0}`")]
    Missing(&'static str),
}

/// Where the decision template comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DecisionRef {
    /// Template text carried in the definition itself.
    Inline(String),
    /// Template text read from a file at evaluation time.
    File { file: PathBuf },
}

/// Search request body, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTemplate {
    /// Rendered whole, then parsed as YAML.
    Text(String),
    /// Every string key and leaf is rendered in place.
    Structured(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "schedule")]
    interval: Option<String>,
    #[serde(default)]
    search: Option<serde_json::Value>,
    #[serde(default)]
    search_url: Option<String>,
    #[serde(default, alias = "decision")]
    process: Option<DecisionRef>,
    #[serde(default)]
    exclusive: bool,
}

/// An immutable alert job definition.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinition {
    /// Controller key: the record id rendered as a decimal string.
    pub name: String,
    pub title: String,
    pub owner: String,
    pub schedule_spec: String,
    pub search_template: SearchTemplate,
    pub search_endpoint: String,
    pub decision: DecisionRef,
    /// Skip a fire while the previous invocation is still running.
    pub exclusive: bool,
}

impl JobDefinition {
    /// Build a definition from a persisted record. The job name is always the
    /// record id; the record's display name becomes the title unless the YAML
    /// sets one.
    pub fn from_record(record: &JobRecord) -> Result<Self, DefinitionError> {
        let mut def = Self::from_yaml(&record.job_name(), &record.value)?;
        if def.title.is_empty() {
            def.title = record.name.clone();
        }
        def.owner = record.user_id.clone();
        Ok(def)
    }

    /// Decode a definition from YAML under the given job name.
    pub fn from_yaml(name: &str, yaml: &str) -> Result<Self, DefinitionError> {
        let raw: RawDefinition = serde_yaml::from_str(yaml)?;

        let schedule_spec = raw
            .interval
            .filter(|s| !s.trim().is_empty())
            .ok_or(DefinitionError::Missing("interval"))?;
        let search = raw.search.ok_or(DefinitionError::Missing("search"))?;
        let search_endpoint = raw
            .search_url
            .filter(|s| !s.trim().is_empty())
            .ok_or(DefinitionError::Missing("search_url"))?;
        let decision = raw.process.ok_or(DefinitionError::Missing("process"))?;

        let search_template = match search {
            serde_json::Value::String(text) => SearchTemplate::Text(text),
            other => SearchTemplate::Structured(other),
        };

        Ok(Self {
            name: name.to_string(),
            title: raw.title.unwrap_or_default(),
            owner: String::new(),
            schedule_spec,
            search_template,
            search_endpoint,
            decision,
            exclusive: raw.exclusive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
interval: "@every 1m"
search_url: /logs/_search
search:
  query: { match_all: {} }
process: "[]"
"#;

    #[test]
    fn decodes_minimal_definition() {
        let def = JobDefinition::from_yaml("7", MINIMAL).unwrap();
        assert_eq!(def.name, "7");
        assert_eq!(def.schedule_spec, "@every 1m");
        assert_eq!(def.search_endpoint, "/logs/_search");
        assert_eq!(def.decision, DecisionRef::Inline("[]".into()));
        assert!(!def.exclusive);
        match def.search_template {
            SearchTemplate::Structured(v) => assert!(v["query"]["match_all"].is_object()),
            other => panic!("expected structured template, got: {other:?}"),
        }
    }

    #[test]
    fn string_search_is_a_text_template() {
        let yaml = r#"
interval: "*/5 * * * *"
search_url: http://es:9200/x/_search
search: |
  query:
    term: { job: "{{ name }}" }
process: { file: decisions/disk.j2 }
exclusive: true
"#;
        let def = JobDefinition::from_yaml("9", yaml).unwrap();
        assert!(matches!(def.search_template, SearchTemplate::Text(ref t) if t.contains("{{ name }}")));
        assert_eq!(
            def.decision,
            DecisionRef::File { file: PathBuf::from("decisions/disk.j2") }
        );
        assert!(def.exclusive);
    }

    #[test]
    fn aliases_are_accepted() {
        let yaml = r#"
schedule: "@hourly"
search_url: /a/_search
search: {}
decision: "[]"
"#;
        let def = JobDefinition::from_yaml("1", yaml).unwrap();
        assert_eq!(def.schedule_spec, "@hourly");
    }

    #[test]
    fn missing_interval_is_named() {
        let yaml = "search_url: /a\nsearch: {}\nprocess: '[]'\n";
        let err = JobDefinition::from_yaml("1", yaml).unwrap_err();
        assert!(matches!(err, DefinitionError::Missing("interval")), "got: {err:?}");
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let err = JobDefinition::from_yaml("1", "interval: [unclosed").unwrap_err();
        assert!(matches!(err, DefinitionError::Yaml(_)));
    }

    #[test]
    fn from_record_uses_id_owner_and_name() {
        let record = JobRecord {
            id: 42,
            user_id: "ops".into(),
            name: "error spike".into(),
            value: MINIMAL.into(),
            status: 1,
            is_deleted: 0,
        };
        let def = JobDefinition::from_record(&record).unwrap();
        assert_eq!(def.name, "42");
        assert_eq!(def.owner, "ops");
        assert_eq!(def.title, "error spike");
    }
}
