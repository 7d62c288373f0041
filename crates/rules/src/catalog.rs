//! JSON project catalog: the project hierarchy plus an optional snapshot of
//! findings and policy violations.
//!
//! ```json
//! {
//!   "projects": [
//!     { "uuid": "...", "name": "shop", "version": "1.0", "active": true },
//!     { "uuid": "...", "name": "shop-api", "parent": "..." }
//!   ],
//!   "findings": [ ... ],
//!   "policy_violations": [ ... ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_core::{Finding, PolicyViolation, Project};

use crate::error::Result;
use crate::store::FindingProvider;

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    policy_violations: Vec<PolicyViolation>,
}

/// Immutable project hierarchy and record snapshot.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Flat project nodes (children empty), keyed by uuid.
    projects: HashMap<Uuid, Project>,
    /// Child uuids per parent, in file order.
    children: HashMap<Uuid, Vec<Uuid>>,
    findings: Vec<Finding>,
    violations: Vec<PolicyViolation>,
}

impl Catalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let catalog = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            projects = catalog.projects.len(),
            findings = catalog.findings.len(),
            violations = catalog.violations.len(),
            "loaded project catalog"
        );
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_parts(file.projects, file.findings, file.policy_violations))
    }

    /// Build a catalog from flat projects linked by their `parent` uuid.
    ///
    /// Nested `children` on the input are flattened first.
    pub fn from_parts(
        projects: Vec<Project>,
        findings: Vec<Finding>,
        violations: Vec<PolicyViolation>,
    ) -> Self {
        let mut flat = Vec::new();
        let mut pending: Vec<Project> = projects.into_iter().rev().collect();
        while let Some(mut project) = pending.pop() {
            for mut child in std::mem::take(&mut project.children).into_iter().rev() {
                child.parent.get_or_insert(project.uuid);
                pending.push(child);
            }
            flat.push(project);
        }

        let mut nodes = HashMap::with_capacity(flat.len());
        let mut order = Vec::with_capacity(flat.len());
        for project in flat {
            order.push(project.uuid);
            if nodes.insert(project.uuid, project).is_some() {
                warn!("duplicate project uuid in catalog, keeping last entry");
            }
        }

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for uuid in order {
            if let Some(parent) = nodes.get(&uuid).and_then(|p| p.parent) {
                let siblings = children.entry(parent).or_default();
                if !siblings.contains(&uuid) {
                    siblings.push(uuid);
                }
            }
        }

        Self {
            projects: nodes,
            children,
            findings,
            violations,
        }
    }

    /// The project with its descendants populated.
    ///
    /// A parent link that leads back into the tree being built is dropped and
    /// logged, so the result is always a finite tree.
    pub fn project_tree(&self, uuid: Uuid) -> Option<Project> {
        let mut visited = HashSet::new();
        self.build_tree(uuid, &mut visited)
    }

    fn build_tree(&self, uuid: Uuid, visited: &mut HashSet<Uuid>) -> Option<Project> {
        let mut node = self.projects.get(&uuid)?.clone();
        visited.insert(uuid);
        for child in self.children.get(&uuid).into_iter().flatten() {
            if visited.contains(child) {
                warn!(project = %uuid, child = %child, "cycle in project hierarchy, dropping link");
                continue;
            }
            if let Some(tree) = self.build_tree(*child, visited) {
                node.children.push(tree);
            }
        }
        Some(node)
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

#[async_trait]
impl FindingProvider for Catalog {
    async fn findings_since(
        &self,
        since: DateTime<Utc>,
        include_suppressed: bool,
    ) -> Result<Vec<Finding>> {
        Ok(self
            .findings
            .iter()
            .filter(|f| f.attributed_on > since && (include_suppressed || !f.suppressed))
            .cloned()
            .collect())
    }

    async fn policy_violations_since(
        &self,
        since: DateTime<Utc>,
        include_suppressed: bool,
    ) -> Result<Vec<PolicyViolation>> {
        Ok(self
            .violations
            .iter()
            .filter(|v| v.timestamp > since && (include_suppressed || !v.suppressed))
            .cloned()
            .collect())
    }

    async fn current_findings(&self, project: Uuid) -> Result<Vec<Finding>> {
        Ok(self
            .findings
            .iter()
            .filter(|f| f.project.uuid == project)
            .cloned()
            .collect())
    }

    async fn current_violations(&self, project: Uuid) -> Result<Vec<PolicyViolation>> {
        Ok(self
            .violations
            .iter()
            .filter(|v| v.project.uuid == project)
            .cloned()
            .collect())
    }
}
