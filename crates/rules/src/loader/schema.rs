//! YAML document format of a notification rule.
//!
//! ```yaml
//! apiVersion: v1
//! kind: NotificationRule
//! metadata:
//!   id: daily-digest
//!   name: Daily vulnerability digest
//!   enabled: true
//! spec:
//!   scope: PORTFOLIO
//!   level: INFORMATIONAL
//!   notifyOn: [NEW_VULNERABILITIES_SUMMARY, NEW_POLICY_VIOLATIONS_SUMMARY]
//!   projects: [5f0c3b1e-8a43-4c62-9d3e-3b1f6a6f2c10]
//!   notifyChildren: true
//!   publisher: webhook
//!   publisherConfig:
//!     destination: https://hooks.example.com/vigil
//!   schedule:
//!     cron: "0 8 * * *"
//!     skipUnchanged: true
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{Level, Project, Rule, ScheduleSpec, Scope, Trigger};

use crate::error::{Result, RuleError};

pub const API_VERSION: &str = "v1";
pub const KIND: &str = "NotificationRule";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRuleDoc {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: RuleMetadata,
    pub spec: RuleSpec,
    /// When the document was parsed; the first digest window of a schedule
    /// without `lastExecution` starts here.
    #[serde(skip, default = "Utc::now")]
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleMetadata {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default = "default_scope")]
    pub scope: Scope,
    #[serde(default = "default_level")]
    pub level: Level,
    /// Group names; unknown names are reported when the rule is resolved.
    #[serde(default)]
    pub notify_on: Vec<String>,
    #[serde(default)]
    pub projects: Vec<Uuid>,
    #[serde(default)]
    pub notify_children: bool,
    #[serde(default)]
    pub log_successful_publish: bool,
    pub publisher: String,
    /// A JSON object, or a string holding one.
    #[serde(default)]
    pub publisher_config: Option<serde_json::Value>,
    #[serde(default)]
    pub schedule: Option<ScheduleDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleDoc {
    pub cron: String,
    #[serde(default)]
    pub skip_unchanged: bool,
    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_scope() -> Scope {
    Scope::Portfolio
}

fn default_level() -> Level {
    Level::Informational
}

impl NotificationRuleDoc {
    /// Parse and validate one YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let doc: Self = serde_yaml::from_str(contents)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind != KIND {
            return Err(RuleError::Validation(format!(
                "unsupported kind '{}', expected '{KIND}'",
                self.kind
            )));
        }
        if self.api_version != API_VERSION {
            return Err(RuleError::Validation(format!(
                "unsupported apiVersion '{}', expected '{API_VERSION}'",
                self.api_version
            )));
        }
        if self.metadata.id.trim().is_empty() {
            return Err(RuleError::Validation("rule metadata.id must not be empty".to_string()));
        }
        if self.spec.publisher.trim().is_empty() {
            return Err(RuleError::Validation(format!(
                "rule '{}' has an empty spec.publisher",
                self.metadata.id
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Build the engine's [`Rule`], resolving each project uuid to a tree.
    pub fn to_rule(&self, resolve: impl Fn(Uuid) -> Project) -> Rule {
        let spec = &self.spec;
        let trigger = match &spec.schedule {
            Some(schedule) => Trigger::Schedule(ScheduleSpec {
                cron: schedule.cron.clone(),
                last_execution_time: schedule.last_execution.unwrap_or(self.loaded_at),
                skip_unchanged: schedule.skip_unchanged,
            }),
            None => Trigger::Event,
        };
        let publisher_config = match &spec.publisher_config {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(raw)) => Some(raw.clone()),
            Some(other) => Some(other.to_string()),
        };

        Rule {
            id: self.metadata.id.clone(),
            name: self
                .metadata
                .name
                .clone()
                .unwrap_or_else(|| self.metadata.id.clone()),
            enabled: self.metadata.enabled,
            scope: spec.scope,
            level_threshold: spec.level,
            trigger,
            notify_on: spec.notify_on.clone(),
            projects: spec.projects.iter().map(|uuid| resolve(*uuid)).collect(),
            notify_children: spec.notify_children,
            log_successful_publish: spec.log_successful_publish,
            publisher_ref: spec.publisher.clone(),
            publisher_config,
        }
    }
}
