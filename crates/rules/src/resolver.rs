//! Selects the event-triggered rules an event should be published to.

use std::sync::Arc;

use tracing::{debug, warn};
use vigil_core::{Event, Level, LevelMatching, Rule, Scope, TriggerType};

use crate::error::Result;
use crate::scope;
use crate::store::RuleStore;

/// Whether an event at `event` level reaches a rule with `threshold`.
pub fn level_matches(matching: LevelMatching, threshold: Level, event: Level) -> bool {
    match matching {
        LevelMatching::Legacy => threshold >= event,
        LevelMatching::AtOrAbove => event >= threshold,
    }
}

/// Filter `rules` down to those `event` should be published to.
///
/// Keeps the input order. A rule whose `notify_on` cannot be parsed is
/// logged and skipped.
pub fn select(rules: &[Rule], event: &Event, matching: LevelMatching) -> Vec<Rule> {
    let projects = event.subject.projects();
    let limit_by_project = event.scope == Scope::Portfolio && !projects.is_empty();

    rules
        .iter()
        .filter(|rule| {
            if !rule.enabled
                || rule.scope != event.scope
                || rule.trigger_type() != TriggerType::Event
                || !level_matches(matching, rule.level_threshold, event.level)
            {
                return false;
            }

            match rule.notify_groups() {
                Ok(groups) if groups.contains(&event.group) => {}
                Ok(_) => return false,
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "skipping rule with malformed notify_on");
                    return false;
                }
            }

            !limit_by_project || scope::applies_to_any(rule, &projects)
        })
        .cloned()
        .collect()
}

/// Resolves events against the rules of a [`RuleStore`].
pub struct RuleResolver {
    store: Arc<dyn RuleStore>,
    matching: LevelMatching,
}

impl RuleResolver {
    pub fn new(store: Arc<dyn RuleStore>, matching: LevelMatching) -> Self {
        Self { store, matching }
    }

    pub fn matching(&self) -> LevelMatching {
        self.matching
    }

    /// Matching enabled event-triggered rules, in store order.
    pub async fn resolve(&self, event: &Event) -> Result<Vec<Rule>> {
        let candidates = self.store.list_enabled_rules(event.scope).await?;
        let matched = select(&candidates, event, self.matching);
        debug!(
            group = %event.group,
            level = %event.level,
            candidates = candidates.len(),
            matched = matched.len(),
            "resolved event"
        );
        Ok(matched)
    }
}
