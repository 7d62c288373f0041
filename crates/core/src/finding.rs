use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::project::{ComponentRef, ProjectRef, VulnerabilityRef};

/// A closed set of classification values a digest counts by.
///
/// Digest maps are zero-filled from [`Category::ALL`].
pub trait Category: Copy + Ord + fmt::Debug + Serialize + DeserializeOwned + 'static {
    const ALL: &'static [Self];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Unassigned,
}

impl Category for Severity {
    const ALL: &'static [Self] = &[
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
        Severity::Unassigned,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
            Severity::Unassigned => write!(f, "UNASSIGNED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    License,
    Security,
    Operational,
}

impl Category for ViolationType {
    const ALL: &'static [Self] = &[
        ViolationType::License,
        ViolationType::Security,
        ViolationType::Operational,
    ];
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationType::License => write!(f, "LICENSE"),
            ViolationType::Security => write!(f, "SECURITY"),
            ViolationType::Operational => write!(f, "OPERATIONAL"),
        }
    }
}

/// Audit/analysis state attached to a finding or violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    Exploitable,
    InTriage,
    FalsePositive,
    NotAffected,
    Resolved,
    Approved,
    Rejected,
    NotSet,
}

/// A vulnerability attributed to a component of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub project: ProjectRef,
    #[serde(default)]
    pub component: Option<ComponentRef>,
    pub vulnerability: VulnerabilityRef,
    pub severity: Severity,
    pub attributed_on: DateTime<Utc>,
    #[serde(default)]
    pub analysis_state: Option<AnalysisState>,
    #[serde(default)]
    pub suppressed: bool,
}

/// A policy condition violated by a component of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub project: ProjectRef,
    #[serde(default)]
    pub component: Option<ComponentRef>,
    pub policy_name: String,
    #[serde(default)]
    pub condition: Option<String>,
    pub violation_type: ViolationType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub analysis_state: Option<AnalysisState>,
    #[serde(default)]
    pub suppressed: bool,
}
