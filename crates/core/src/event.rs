use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{PolicyViolationDigest, VulnerabilityDigest};
use crate::error::VigilError;
use crate::project::{ComponentRef, ProjectRef, VulnerabilityRef};
use crate::finding::{AnalysisState, ViolationType};

/// Severity classification of an event, or the configured threshold of a rule.
///
/// Ordered `Informational < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Informational,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Informational => write!(f, "INFORMATIONAL"),
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for Level {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFORMATIONAL" => Ok(Level::Informational),
            "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            other => Err(VigilError::UnknownVariant {
                kind: "level",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether an event is engine-wide or relative to the project portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    System,
    Portfolio,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::System => write!(f, "SYSTEM"),
            Scope::Portfolio => write!(f, "PORTFOLIO"),
        }
    }
}

impl FromStr for Scope {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SYSTEM" => Ok(Scope::System),
            "PORTFOLIO" => Ok(Scope::Portfolio),
            other => Err(VigilError::UnknownVariant {
                kind: "scope",
                value: other.to_string(),
            }),
        }
    }
}

macro_rules! groups {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Lifecycle event group a rule can subscribe to.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum Group {
            $($variant),+
        }

        impl Group {
            /// Every group, in declaration order.
            pub const ALL: &'static [Group] = &[$(Group::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Group::$variant => $name),+
                }
            }
        }

        impl FromStr for Group {
            type Err = VigilError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok(Group::$variant),)+
                    other => Err(VigilError::UnknownVariant {
                        kind: "group",
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

groups! {
    Configuration => "CONFIGURATION",
    DatasourceMirroring => "DATASOURCE_MIRRORING",
    Repository => "REPOSITORY",
    Integration => "INTEGRATION",
    FileSystem => "FILE_SYSTEM",
    Analyzer => "ANALYZER",
    IndexingService => "INDEXING_SERVICE",
    NewVulnerability => "NEW_VULNERABILITY",
    NewVulnerableDependency => "NEW_VULNERABLE_DEPENDENCY",
    ProjectAuditChange => "PROJECT_AUDIT_CHANGE",
    BomConsumed => "BOM_CONSUMED",
    BomProcessed => "BOM_PROCESSED",
    BomProcessingFailed => "BOM_PROCESSING_FAILED",
    BomValidationFailed => "BOM_VALIDATION_FAILED",
    VexConsumed => "VEX_CONSUMED",
    VexProcessed => "VEX_PROCESSED",
    PolicyViolation => "POLICY_VIOLATION",
    ProjectCreated => "PROJECT_CREATED",
    UserCreated => "USER_CREATED",
    UserDeleted => "USER_DELETED",
    NewVulnerabilitiesSummary => "NEW_VULNERABILITIES_SUMMARY",
    NewPolicyViolationsSummary => "NEW_POLICY_VIOLATIONS_SUMMARY",
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by an [`Event`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    NewVulnerability {
        component: ComponentRef,
        vulnerability: VulnerabilityRef,
        #[serde(default)]
        affected_projects: Vec<ProjectRef>,
    },
    NewVulnerableDependency {
        project: ProjectRef,
        component: ComponentRef,
        #[serde(default)]
        vulnerabilities: Vec<VulnerabilityRef>,
    },
    Bom {
        project: ProjectRef,
        #[serde(default)]
        format: Option<String>,
    },
    BomProcessingFailed {
        project: ProjectRef,
        #[serde(default)]
        cause: Option<String>,
    },
    PolicyViolation {
        project: ProjectRef,
        component: ComponentRef,
        violation_type: ViolationType,
    },
    AnalysisDecisionChange {
        project: ProjectRef,
        component: ComponentRef,
        vulnerability: VulnerabilityRef,
        state: AnalysisState,
        #[serde(default)]
        suppressed: bool,
    },
    ViolationAnalysisDecisionChange {
        project: ProjectRef,
        component: ComponentRef,
        state: AnalysisState,
        #[serde(default)]
        suppressed: bool,
    },
    Vex {
        project: ProjectRef,
    },
    ProjectCreated {
        project: ProjectRef,
    },
    VulnerabilityDigest(VulnerabilityDigest),
    PolicyViolationDigest(PolicyViolationDigest),
    #[default]
    None,
}

impl Subject {
    /// Project references carried by this subject, in payload order.
    ///
    /// Digests are rule-scoped already and report no projects here.
    pub fn projects(&self) -> Vec<&ProjectRef> {
        match self {
            Subject::NewVulnerability {
                affected_projects, ..
            } => affected_projects.iter().collect(),
            Subject::NewVulnerableDependency { project, .. }
            | Subject::Bom { project, .. }
            | Subject::BomProcessingFailed { project, .. }
            | Subject::PolicyViolation { project, .. }
            | Subject::AnalysisDecisionChange { project, .. }
            | Subject::ViolationAnalysisDecisionChange { project, .. }
            | Subject::Vex { project }
            | Subject::ProjectCreated { project } => vec![project],
            Subject::VulnerabilityDigest(_) | Subject::PolicyViolationDigest(_) | Subject::None => {
                Vec::new()
            }
        }
    }

    pub fn component(&self) -> Option<&ComponentRef> {
        match self {
            Subject::NewVulnerability { component, .. }
            | Subject::NewVulnerableDependency { component, .. }
            | Subject::PolicyViolation { component, .. }
            | Subject::AnalysisDecisionChange { component, .. }
            | Subject::ViolationAnalysisDecisionChange { component, .. } => Some(component),
            _ => None,
        }
    }
}

/// A transient lifecycle fact dispatched into the engine. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub group: Group,
    pub level: Level,
    pub scope: Scope,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub subject: Subject,
}

impl Event {
    pub fn new(scope: Scope, group: Group, level: Level) -> Self {
        Self {
            group,
            level,
            scope,
            timestamp: Utc::now(),
            title: String::new(),
            content: String::new(),
            subject: Subject::None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
