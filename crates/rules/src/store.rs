//! Store boundaries consumed by the engine, and an in-memory store.
//!
//! [`RuleStore`] supplies rules and projects; [`FindingProvider`] supplies
//! the records a digest is built from. Implementations take their locks per
//! call and never hold them across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;
use vigil_core::{Finding, PolicyViolation, Project, Rule, Scope, Trigger, TriggerType};

use crate::catalog::Catalog;
use crate::error::{Result, RuleError};
use crate::loader::NotificationRuleDoc;

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Enabled rules of `scope`, in insertion order.
    async fn list_enabled_rules(&self, scope: Scope) -> Result<Vec<Rule>>;

    /// Every SCHEDULE rule, enabled or not.
    async fn list_scheduled_rules(&self) -> Result<Vec<Rule>>;

    async fn get_rule(&self, id: &str) -> Result<Option<Rule>>;

    /// Project with its children populated.
    async fn get_project(&self, uuid: Uuid) -> Result<Option<Project>>;

    /// Record that the scheduled rule `id` ran, moving its digest window.
    async fn mark_executed(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait FindingProvider: Send + Sync {
    /// Findings attributed strictly after `since`.
    async fn findings_since(
        &self,
        since: DateTime<Utc>,
        include_suppressed: bool,
    ) -> Result<Vec<Finding>>;

    /// Policy violations raised strictly after `since`.
    async fn policy_violations_since(
        &self,
        since: DateTime<Utc>,
        include_suppressed: bool,
    ) -> Result<Vec<PolicyViolation>>;

    /// The project's full current finding set.
    async fn current_findings(&self, project: Uuid) -> Result<Vec<Finding>>;

    /// The project's full current policy violation set.
    async fn current_violations(&self, project: Uuid) -> Result<Vec<PolicyViolation>>;
}

/// Rule store backed by an in-memory map plus a project [`Catalog`].
///
/// Rules keep insertion order. Last-execution times recorded through
/// [`RuleStore::mark_executed`] survive a [`MemoryStore::sync_documents`]
/// reload.
pub struct MemoryStore {
    catalog: Arc<Catalog>,
    rules: RwLock<IndexMap<String, Rule>>,
    executions: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            rules: RwLock::new(IndexMap::new()),
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// Store seeded with already-hydrated rules.
    pub fn with_rules(catalog: Arc<Catalog>, rules: Vec<Rule>) -> Self {
        let store = Self::new(catalog);
        for rule in rules {
            store.upsert(rule);
        }
        store
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Insert or replace a rule, keeping its original position on replace.
    pub fn upsert(&self, mut rule: Rule) {
        self.apply_execution(&mut rule);
        self.rules
            .write()
            .expect("rules lock poisoned")
            .insert(rule.id.clone(), rule);
    }

    pub fn remove(&self, id: &str) -> Option<Rule> {
        self.rules.write().expect("rules lock poisoned").shift_remove(id)
    }

    /// Replace the rule set with `docs`, hydrating project references from
    /// the catalog. Documents are applied in id order.
    pub fn sync_documents(&self, docs: &HashMap<String, NotificationRuleDoc>) {
        let mut ids: Vec<&String> = docs.keys().collect();
        ids.sort();

        let mut next = IndexMap::with_capacity(ids.len());
        for id in ids {
            let mut rule = docs[id].to_rule(|uuid| self.hydrate_project(id, uuid));
            self.apply_execution(&mut rule);
            next.insert(rule.id.clone(), rule);
        }

        let count = next.len();
        *self.rules.write().expect("rules lock poisoned") = next;
        debug!(rules = count, "rule store synchronized");
    }

    fn hydrate_project(&self, rule_id: &str, uuid: Uuid) -> Project {
        self.catalog.project_tree(uuid).unwrap_or_else(|| {
            warn!(rule_id = %rule_id, project = %uuid, "rule references unknown project");
            Project::new(uuid, uuid.to_string())
        })
    }

    fn apply_execution(&self, rule: &mut Rule) {
        let executions = self.executions.read().expect("executions lock poisoned");
        if let (Some(at), Trigger::Schedule(spec)) = (executions.get(&rule.id), &mut rule.trigger) {
            spec.last_execution_time = *at;
        }
    }

    pub fn len(&self) -> usize {
        self.rules.read().expect("rules lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_enabled_rules(&self, scope: Scope) -> Result<Vec<Rule>> {
        let rules = self.rules.read().expect("rules lock poisoned");
        Ok(rules
            .values()
            .filter(|r| r.enabled && r.scope == scope)
            .cloned()
            .collect())
    }

    async fn list_scheduled_rules(&self) -> Result<Vec<Rule>> {
        let rules = self.rules.read().expect("rules lock poisoned");
        Ok(rules
            .values()
            .filter(|r| r.trigger_type() == TriggerType::Schedule)
            .cloned()
            .collect())
    }

    async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        Ok(self.rules.read().expect("rules lock poisoned").get(id).cloned())
    }

    async fn get_project(&self, uuid: Uuid) -> Result<Option<Project>> {
        Ok(self.catalog.project_tree(uuid))
    }

    async fn mark_executed(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut rules = self.rules.write().expect("rules lock poisoned");
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| RuleError::Store(format!("no rule with id '{id}'")))?;
        if let Trigger::Schedule(spec) = &mut rule.trigger {
            spec.last_execution_time = at;
        }
        drop(rules);

        self.executions
            .write()
            .expect("executions lock poisoned")
            .insert(id.to_string(), at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Level, ScheduleSpec};

    fn scheduled(id: &str) -> Rule {
        Rule::new(id, Scope::Portfolio, Level::Informational, "console").scheduled(ScheduleSpec {
            cron: "0 8 * * *".into(),
            last_execution_time: Utc::now() - chrono::Duration::days(1),
            skip_unchanged: false,
        })
    }

    #[tokio::test]
    async fn enabled_rules_keep_insertion_order() {
        let mut disabled = Rule::new("b", Scope::Portfolio, Level::Warning, "console");
        disabled.enabled = false;
        let store = MemoryStore::with_rules(
            Arc::new(Catalog::default()),
            vec![
                Rule::new("c", Scope::Portfolio, Level::Warning, "console"),
                disabled,
                Rule::new("a", Scope::Portfolio, Level::Warning, "console"),
                Rule::new("s", Scope::System, Level::Warning, "console"),
            ],
        );

        let ids: Vec<String> = store
            .list_enabled_rules(Scope::Portfolio)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn mark_executed_moves_window_and_survives_upsert() {
        let store = MemoryStore::with_rules(Arc::new(Catalog::default()), vec![scheduled("digest")]);
        let at = Utc::now();
        store.mark_executed("digest", at).await.unwrap();

        let rule = store.get_rule("digest").await.unwrap().unwrap();
        assert_eq!(rule.schedule().unwrap().last_execution_time, at);

        store.upsert(scheduled("digest"));
        let rule = store.get_rule("digest").await.unwrap().unwrap();
        assert_eq!(rule.schedule().unwrap().last_execution_time, at);
    }

    #[tokio::test]
    async fn mark_executed_unknown_rule_fails() {
        let store = MemoryStore::new(Arc::new(Catalog::default()));
        assert!(matches!(
            store.mark_executed("ghost", Utc::now()).await,
            Err(RuleError::Store(_))
        ));
    }

    #[tokio::test]
    async fn scheduled_listing_includes_disabled_rules() {
        let mut off = scheduled("off");
        off.enabled = false;
        let store = MemoryStore::with_rules(
            Arc::new(Catalog::default()),
            vec![scheduled("on"), off, Rule::new("evt", Scope::Portfolio, Level::Error, "console")],
        );
        assert_eq!(store.list_scheduled_rules().await.unwrap().len(), 2);
    }
}
