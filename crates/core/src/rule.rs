use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VigilError;
use crate::event::{Group, Level, Scope};
use crate::project::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Event,
    Schedule,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::Event => write!(f, "EVENT"),
            TriggerType::Schedule => write!(f, "SCHEDULE"),
        }
    }
}

/// Schedule settings of a schedule-triggered rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// 5-field (minute precision) or 6-field (second precision) cron expression.
    pub cron: String,
    /// Lower bound (exclusive) of the next digest window.
    pub last_execution_time: DateTime<Utc>,
    /// Publish nothing when the window produced no records.
    #[serde(default)]
    pub skip_unchanged: bool,
}

/// How a rule is fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Event,
    Schedule(ScheduleSpec),
}

/// User configuration mapping a filter to a publisher. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub scope: Scope,
    pub level_threshold: Level,
    pub trigger: Trigger,
    /// Group names as persisted; see [`Rule::notify_groups`].
    pub notify_on: Vec<String>,
    /// Projects the rule is limited to (children populated). Empty means portfolio-wide.
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub notify_children: bool,
    #[serde(default)]
    pub log_successful_publish: bool,
    pub publisher_ref: String,
    /// Opaque publisher configuration, a JSON object when present.
    #[serde(default)]
    pub publisher_config: Option<String>,
}

impl Rule {
    /// An enabled, unscoped, event-triggered rule publishing to `publisher_ref`.
    pub fn new(
        id: impl Into<String>,
        scope: Scope,
        level_threshold: Level,
        publisher_ref: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            scope,
            level_threshold,
            trigger: Trigger::Event,
            notify_on: Vec::new(),
            projects: Vec::new(),
            notify_children: false,
            log_successful_publish: false,
            publisher_ref: publisher_ref.into(),
            publisher_config: None,
        }
    }

    pub fn notify_on<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: fmt::Display,
    {
        self.notify_on = groups.into_iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn limited_to(mut self, projects: Vec<Project>, notify_children: bool) -> Self {
        self.projects = projects;
        self.notify_children = notify_children;
        self
    }

    pub fn scheduled(mut self, schedule: ScheduleSpec) -> Self {
        self.trigger = Trigger::Schedule(schedule);
        self
    }

    pub fn trigger_type(&self) -> TriggerType {
        match self.trigger {
            Trigger::Event => TriggerType::Event,
            Trigger::Schedule(_) => TriggerType::Schedule,
        }
    }

    pub fn schedule(&self) -> Option<&ScheduleSpec> {
        match &self.trigger {
            Trigger::Schedule(spec) => Some(spec),
            Trigger::Event => None,
        }
    }

    /// Parse the persisted group names.
    ///
    /// Fails on the first unknown name; callers skip the rule in that case.
    pub fn notify_groups(&self) -> Result<BTreeSet<Group>, VigilError> {
        self.notify_on.iter().map(|g| g.parse::<Group>()).collect()
    }

    pub fn is_unscoped(&self) -> bool {
        self.projects.is_empty()
    }
}
