//! Publisher trait definition, publish context, and shared error types.

use serde_json::{Map, Value};

use vigil_core::{Event, Rule, Subject};

/// Errors that can occur while handing an event to a publisher.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unknown publisher: '{0}'")]
    UnknownPublisher(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Publisher configuration, the parsed JSON object of `Rule::publisher_config`.
pub type PublisherSettings = Map<String, Value>;

/// Parse a rule's opaque publisher configuration.
///
/// A missing blob yields an empty object; anything that is not a JSON object
/// is a configuration error.
pub fn parse_settings(raw: Option<&str>) -> Result<PublisherSettings, PublishError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PublishError::Config(format!(
            "publisher config must be a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(PublishError::Config(format!("invalid publisher config: {e}"))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rendering context handed to publishers alongside the event.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PublishContext {
    pub group: String,
    pub level: String,
    pub scope: String,
    /// RFC 3339 UTC timestamp of the event.
    pub timestamp: String,
    /// Project/component/vulnerability references extracted from the subject.
    pub subjects: Map<String, Value>,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub rule_scope: Option<String>,
    pub rule_level: Option<String>,
    pub log_success: bool,
}

impl PublishContext {
    pub fn from_event(event: &Event) -> Self {
        Self {
            group: event.group.to_string(),
            level: event.level.to_string(),
            scope: event.scope.to_string(),
            timestamp: event.timestamp.to_rfc3339(),
            subjects: subject_refs(&event.subject),
            rule_id: None,
            rule_name: None,
            rule_scope: None,
            rule_level: None,
            log_success: false,
        }
    }

    /// Enrich the context with the matched rule once known.
    pub fn with_rule(mut self, rule: &Rule) -> Self {
        self.rule_id = Some(rule.id.clone());
        self.rule_name = Some(rule.name.clone());
        self.rule_scope = Some(rule.scope.to_string());
        self.rule_level = Some(rule.level_threshold.to_string());
        self.log_success = rule.log_successful_publish;
        self
    }
}

fn subject_refs(subject: &Subject) -> Map<String, Value> {
    let mut refs = Map::new();
    let mut put = |key: &str, value: Value| {
        refs.insert(key.to_string(), value);
    };
    match subject {
        Subject::NewVulnerability {
            component,
            vulnerability,
            affected_projects,
        } => {
            put("component", serde_json::json!(component));
            put("projects", serde_json::json!(affected_projects));
            put("vulnerability", serde_json::json!(vulnerability));
        }
        Subject::NewVulnerableDependency {
            project,
            component,
            vulnerabilities,
        } => {
            put("component", serde_json::json!(component));
            put("project", serde_json::json!(project));
            put("vulnerabilities", serde_json::json!(vulnerabilities));
        }
        Subject::AnalysisDecisionChange {
            project,
            component,
            vulnerability,
            ..
        } => {
            put("component", serde_json::json!(component));
            put("project", serde_json::json!(project));
            put("vulnerability", serde_json::json!(vulnerability));
        }
        Subject::PolicyViolation {
            project, component, ..
        }
        | Subject::ViolationAnalysisDecisionChange {
            project, component, ..
        } => {
            put("component", serde_json::json!(component));
            put("project", serde_json::json!(project));
        }
        Subject::Bom { project, .. }
        | Subject::BomProcessingFailed { project, .. }
        | Subject::Vex { project }
        | Subject::ProjectCreated { project } => {
            put("project", serde_json::json!(project));
        }
        Subject::VulnerabilityDigest(digest) => {
            put("rule_id", Value::String(digest.rule_id.clone()));
            put("since", Value::String(digest.since.to_rfc3339()));
        }
        Subject::PolicyViolationDigest(digest) => {
            put("rule_id", Value::String(digest.rule_id.clone()));
            put("since", Value::String(digest.since.to_rfc3339()));
        }
        Subject::None => {}
    }
    refs
}

/// Trait for publisher implementations (chat webhook, email, ticketing, ...).
///
/// Delivery, retries, and destination-specific formatting are the
/// publisher's responsibility.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `event` to the destination described by `settings`.
    async fn publish(
        &self,
        ctx: &PublishContext,
        event: &Event,
        settings: &PublisherSettings,
    ) -> Result<(), PublishError>;

    /// Stable key this publisher registers under (e.g., "webhook", "console").
    fn name(&self) -> &str;
}

/// Result of dispatching one event for one rule.
#[derive(Debug)]
pub struct DispatchResult {
    pub rule_id: String,
    pub publisher: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
