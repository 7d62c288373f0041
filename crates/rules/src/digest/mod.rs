//! Digest aggregation for schedule-triggered rules.
//!
//! Both digest kinds share one algorithm over [`DigestRecord`]: fetch the
//! records of the window, keep those the rule's project scope accepts, group
//! them by project in first-seen order, then derive the overview, per-project
//! summary and details. The per-project `total` column comes from the
//! project's full current record set.

mod records;


use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;
use vigil_core::digest::{zeroed, CategoryCounts, DigestPayload, Overview, ProjectDetails, ProjectSummary};
use vigil_core::{PolicyViolationDigest, ProjectRef, Rule, VulnerabilityDigest};

use crate::error::Result;
use crate::scope;
use crate::store::FindingProvider;

pub use self::records::DigestRecord;

/// Accepted records of one project, in fetch order.
pub type Grouped<R> = IndexMap<Uuid, (ProjectRef, Vec<R>)>;

/// Keep the records `rule` accepts and group them by project.
///
/// Records at or before `since` are dropped even if the provider returned them.
pub fn group_accepted<R: DigestRecord>(rule: &Rule, since: DateTime<Utc>, records: Vec<R>) -> Grouped<R> {
    let mut grouped: Grouped<R> = IndexMap::new();
    for record in records {
        if record.timestamp() <= since || !scope::applies(rule, record.project().uuid) {
            continue;
        }
        grouped
            .entry(record.project().uuid)
            .or_insert_with(|| (record.project().clone(), Vec::new()))
            .1
            .push(record);
    }
    grouped
}

/// Count `records` per category, suppressed ones included.
pub fn count_by_category<R: DigestRecord>(records: &[R]) -> CategoryCounts<R::Category> {
    let mut counts = zeroed();
    for record in records {
        *counts.entry(record.category()).or_insert(0) += 1;
    }
    counts
}

/// Build the three digest views from grouped records.
///
/// `current` holds each project's full current per-category counts; a project
/// missing from it gets a zero-filled `total`.
pub fn assemble<R: DigestRecord>(
    rule_id: &str,
    since: DateTime<Utc>,
    grouped: Grouped<R>,
    current: &HashMap<Uuid, CategoryCounts<R::Category>>,
) -> DigestPayload<R::Category, R::Detail> {
    let mut overview = Overview::default();
    let mut summary = IndexMap::with_capacity(grouped.len());
    let mut details = IndexMap::with_capacity(grouped.len());

    for (uuid, (project, records)) in grouped {
        overview.affected_projects += 1;
        let mut project_summary = ProjectSummary::empty(project.clone());
        if let Some(total) = current.get(&uuid) {
            project_summary.total = total.clone();
        }

        for record in &records {
            if record.has_component() {
                overview.affected_components += 1;
            }
            let category = record.category();
            if record.is_suppressed() {
                overview.suppressed += 1;
                *project_summary.suppressed.entry(category).or_insert(0) += 1;
            } else {
                overview.total += 1;
                *overview.by_category.entry(category).or_insert(0) += 1;
                *project_summary.new.entry(category).or_insert(0) += 1;
            }
        }

        summary.insert(uuid, project_summary);
        details.insert(
            uuid,
            ProjectDetails {
                project,
                records: records.iter().map(|r| r.to_detail()).collect(),
            },
        );
    }

    DigestPayload {
        rule_id: rule_id.to_string(),
        since,
        overview,
        summary,
        details,
    }
}

/// Builds digests from a [`FindingProvider`].
pub struct DigestAggregator {
    provider: Arc<dyn FindingProvider>,
}

impl DigestAggregator {
    pub fn new(provider: Arc<dyn FindingProvider>) -> Self {
        Self { provider }
    }

    pub async fn build_vulnerability_digest(
        &self,
        rule: &Rule,
        since: DateTime<Utc>,
    ) -> Result<VulnerabilityDigest> {
        let records = self.provider.findings_since(since, true).await?;
        let grouped = group_accepted(rule, since, records);

        let mut current = HashMap::with_capacity(grouped.len());
        for uuid in grouped.keys() {
            let findings = self.provider.current_findings(*uuid).await?;
            current.insert(*uuid, count_by_category(&findings));
        }

        let digest = assemble(&rule.id, since, grouped, &current);
        debug!(
            rule_id = %rule.id,
            projects = digest.overview.affected_projects,
            total = digest.overview.total,
            suppressed = digest.overview.suppressed,
            "built vulnerability digest"
        );
        Ok(digest)
    }

    pub async fn build_policy_violation_digest(
        &self,
        rule: &Rule,
        since: DateTime<Utc>,
    ) -> Result<PolicyViolationDigest> {
        let records = self.provider.policy_violations_since(since, true).await?;
        let grouped = group_accepted(rule, since, records);

        let mut current = HashMap::with_capacity(grouped.len());
        for uuid in grouped.keys() {
            let violations = self.provider.current_violations(*uuid).await?;
            current.insert(*uuid, count_by_category(&violations));
        }

        let digest = assemble(&rule.id, since, grouped, &current);
        debug!(
            rule_id = %rule.id,
            projects = digest.overview.affected_projects,
            total = digest.overview.total,
            suppressed = digest.overview.suppressed,
            "built policy violation digest"
        );
        Ok(digest)
    }
}
