//! Project scope limiting: does a rule's project list cover a project?
//!
//! A rule with no projects covers the whole portfolio. Otherwise a project
//! is covered when it is one of the rule's projects, or, with
//! `notify_children` set, an active strict descendant of one of them.

use std::collections::HashSet;

use uuid::Uuid;
use vigil_core::{ProjectRef, Rule};

/// Whether `rule` applies to the project identified by `project`.
pub fn applies(rule: &Rule, project: Uuid) -> bool {
    if rule.is_unscoped() {
        return true;
    }
    rule.projects.iter().any(|limit| {
        limit.uuid == project || (rule.notify_children && is_descendant(limit, project))
    })
}

/// Whether `rule` applies to any of `projects`.
///
/// An event that names no projects is never limited out.
pub fn applies_to_any(rule: &Rule, projects: &[&ProjectRef]) -> bool {
    projects.is_empty() || projects.iter().any(|p| applies(rule, p.uuid))
}

/// Depth-first search below `ancestor` for an active project with uuid `target`.
///
/// Inactive intermediate projects are still traversed; only the matching
/// node itself has to be active. Already-visited nodes are skipped, so a
/// malformed hierarchy cannot loop.
pub fn is_descendant(ancestor: &vigil_core::Project, target: Uuid) -> bool {
    let mut visited: HashSet<Uuid> = HashSet::from([ancestor.uuid]);
    let mut stack: Vec<&vigil_core::Project> = ancestor.children.iter().collect();

    while let Some(node) = stack.pop() {
        if !visited.insert(node.uuid) {
            continue;
        }
        if node.uuid == target && node.active {
            return true;
        }
        stack.extend(node.children.iter());
    }
    false
}
