//! Digest payload built for schedule-triggered rules.
//!
//! A digest nests three views over the same accepted records: an
//! [`Overview`] of totals, a per-project [`ProjectSummary`], and the raw
//! per-project [`ProjectDetails`]. Per-category maps are zero-filled so every
//! category is always present.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::finding::{AnalysisState, Category, Severity, ViolationType};
use crate::project::{ComponentRef, ProjectRef, VulnerabilityRef};

/// Count per category, with an entry for every category.
pub type CategoryCounts<C> = BTreeMap<C, usize>;

/// A zero-filled count map over every value of `C`.
pub fn zeroed<C: Category>() -> CategoryCounts<C> {
    C::ALL.iter().map(|c| (*c, 0)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = ""))]
pub struct Overview<C: Category> {
    /// Distinct projects with at least one accepted record.
    pub affected_projects: usize,
    /// Accepted records that reference a component (not deduplicated).
    pub affected_components: usize,
    /// Accepted, non-suppressed records.
    pub total: usize,
    /// Accepted, suppressed records.
    pub suppressed: usize,
    /// Non-suppressed accepted records per category.
    pub by_category: CategoryCounts<C>,
}

impl<C: Category> Default for Overview<C> {
    fn default() -> Self {
        Self {
            affected_projects: 0,
            affected_components: 0,
            total: 0,
            suppressed: 0,
            by_category: zeroed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = ""))]
pub struct ProjectSummary<C: Category> {
    pub project: ProjectRef,
    /// Non-suppressed records accepted in this window.
    pub new: CategoryCounts<C>,
    /// The project's full current record set, regardless of window.
    pub total: CategoryCounts<C>,
    /// Suppressed records accepted in this window.
    pub suppressed: CategoryCounts<C>,
}

impl<C: Category> ProjectSummary<C> {
    pub fn empty(project: ProjectRef) -> Self {
        Self {
            project,
            new: zeroed(),
            total: zeroed(),
            suppressed: zeroed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails<D> {
    pub project: ProjectRef,
    pub records: Vec<D>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "D: serde::de::DeserializeOwned"))]
pub struct DigestPayload<C: Category, D> {
    pub rule_id: String,
    pub since: DateTime<Utc>,
    pub overview: Overview<C>,
    /// Keyed by project UUID, in first-seen order.
    pub summary: IndexMap<Uuid, ProjectSummary<C>>,
    /// Keyed by project UUID, in first-seen order.
    pub details: IndexMap<Uuid, ProjectDetails<D>>,
}

impl<C: Category, D> DigestPayload<C, D> {
    /// True when the window produced no records at all, suppressed or not.
    pub fn is_empty(&self) -> bool {
        self.overview.total == 0 && self.overview.suppressed == 0
    }
}

/// Rendering-friendly view of a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingDetail {
    pub component: Option<ComponentRef>,
    pub vulnerability: VulnerabilityRef,
    pub severity: Severity,
    pub attributed_on: DateTime<Utc>,
    pub analysis_state: Option<AnalysisState>,
    pub suppressed: bool,
}

/// Rendering-friendly view of a policy violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationDetail {
    pub component: Option<ComponentRef>,
    pub policy_name: String,
    pub condition: Option<String>,
    pub violation_type: ViolationType,
    pub timestamp: DateTime<Utc>,
    pub analysis_state: Option<AnalysisState>,
    pub suppressed: bool,
}

pub type VulnerabilityDigest = DigestPayload<Severity, FindingDetail>;
pub type PolicyViolationDigest = DigestPayload<ViolationType, ViolationDetail>;
