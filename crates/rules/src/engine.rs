//! The notification engine: event routing plus scheduled digests.
//!
//! Events go through the [`RuleResolver`] and every matched rule is handed to
//! the [`Dispatcher`]. Schedule-triggered rules are armed on the
//! [`TaskScheduler`]; each run builds the digests the rule subscribes to and
//! dispatches them as an INFORMATIONAL event.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vigil_core::{Event, Group, Level, LevelMatching, Rule, Subject, VigilError};
use vigil_notify::{DispatchResult, Dispatcher};

use crate::digest::DigestAggregator;
use crate::error::{Result, RuleError};
use crate::resolver::RuleResolver;
use crate::scheduler::{ScheduledJob, TaskKind, TaskScheduler};
use crate::store::{FindingProvider, RuleStore};

/// Digest a scheduled rule can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DigestKind {
    Vulnerabilities,
    PolicyViolations,
}

impl DigestKind {
    /// Digest built for a subscribed group, if any.
    pub fn for_group(group: Group) -> Option<Self> {
        match group {
            Group::NewVulnerabilitiesSummary | Group::NewVulnerability => Some(Self::Vulnerabilities),
            Group::NewPolicyViolationsSummary | Group::PolicyViolation => Some(Self::PolicyViolations),
            _ => None,
        }
    }

    pub fn group(self) -> Group {
        match self {
            Self::Vulnerabilities => Group::NewVulnerabilitiesSummary,
            Self::PolicyViolations => Group::NewPolicyViolationsSummary,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Vulnerabilities => "New Vulnerabilities Summary",
            Self::PolicyViolations => "New Policy Violations Summary",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Vulnerabilities => "vulnerabilities",
            Self::PolicyViolations => "policy violations",
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Outcome of one scheduled run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Digests built, whether or not they were published.
    pub processed: Vec<DigestKind>,
    /// Digests handed to a publisher that reported success.
    pub published: usize,
    /// Empty digests withheld because the rule skips unchanged windows.
    pub skipped_unchanged: usize,
}

/// Outcome of [`NotificationEngine::sync_schedules`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub armed: usize,
    pub rearmed: usize,
    pub cancelled: usize,
    pub invalid: usize,
}

/// A built digest plus the counts its event content is rendered from.
struct BuiltDigest {
    kind: DigestKind,
    subject: Subject,
    empty: bool,
    total: usize,
    suppressed: usize,
    projects: usize,
}

impl BuiltDigest {
    fn into_event(self, rule: &Rule, since: DateTime<Utc>, at: DateTime<Utc>) -> Event {
        Event::new(rule.scope, self.kind.group(), Level::Informational)
            .at(at)
            .with_title(self.kind.title())
            .with_content(format!(
                "{} new {} ({} suppressed) across {} project(s) since {}",
                self.total,
                self.kind.noun(),
                self.suppressed,
                self.projects,
                since.to_rfc3339()
            ))
            .with_subject(self.subject)
    }
}

struct EngineCore {
    store: Arc<dyn RuleStore>,
    aggregator: DigestAggregator,
    dispatcher: Arc<Dispatcher>,
}

impl EngineCore {
    /// Run scheduled rule `rule_id` once.
    ///
    /// `Ok(None)` means the rule is gone, disabled, or no longer scheduled.
    /// If any digest cannot be built the whole cycle is abandoned: nothing is
    /// published and the digest window stays where it was.
    async fn run_rule(&self, rule_id: &str) -> Result<Option<RunReport>> {
        let Some(rule) = self.store.get_rule(rule_id).await? else {
            info!(rule_id = %rule_id, "scheduled rule no longer exists, skipping run");
            return Ok(None);
        };
        let Some(schedule) = rule.schedule().filter(|_| rule.enabled) else {
            info!(rule_id = %rule_id, "scheduled rule disabled or not schedule-triggered, skipping run");
            return Ok(None);
        };

        let started = Utc::now();
        let since = schedule.last_execution_time;

        let mut digests = Vec::new();
        for kind in digest_kinds(&rule)? {
            digests.push(self.build(kind, &rule, since).await.map_err(|e| {
                warn!(rule_id = %rule.id, digest = %kind, error = %e, "failed to build digest, abandoning run");
                e
            })?);
        }

        let mut report = RunReport::default();
        for digest in digests {
            report.processed.push(digest.kind);
            if digest.empty && schedule.skip_unchanged {
                debug!(rule_id = %rule.id, digest = %digest.kind, "nothing new since last run, not publishing");
                report.skipped_unchanged += 1;
                continue;
            }
            let event = digest.into_event(&rule, since, started);
            if self.dispatcher.dispatch(&rule, &event).await.success {
                report.published += 1;
            }
        }

        if !report.processed.is_empty() {
            self.store.mark_executed(&rule.id, started).await?;
        }

        info!(
            rule_id = %rule.id,
            processed = report.processed.len(),
            published = report.published,
            skipped_unchanged = report.skipped_unchanged,
            "scheduled run finished"
        );
        Ok(Some(report))
    }

    async fn build(&self, kind: DigestKind, rule: &Rule, since: DateTime<Utc>) -> Result<BuiltDigest> {
        Ok(match kind {
            DigestKind::Vulnerabilities => {
                let d = self.aggregator.build_vulnerability_digest(rule, since).await?;
                BuiltDigest {
                    kind,
                    empty: d.is_empty(),
                    total: d.overview.total,
                    suppressed: d.overview.suppressed,
                    projects: d.overview.affected_projects,
                    subject: Subject::VulnerabilityDigest(d),
                }
            }
            DigestKind::PolicyViolations => {
                let d = self.aggregator.build_policy_violation_digest(rule, since).await?;
                BuiltDigest {
                    kind,
                    empty: d.is_empty(),
                    total: d.overview.total,
                    suppressed: d.overview.suppressed,
                    projects: d.overview.affected_projects,
                    subject: Subject::PolicyViolationDigest(d),
                }
            }
        })
    }
}

/// Digests `rule` subscribes to, deduplicated. Unrelated groups are logged.
fn digest_kinds(rule: &Rule) -> Result<BTreeSet<DigestKind>> {
    let mut kinds = BTreeSet::new();
    for group in rule.notify_groups()? {
        match DigestKind::for_group(group) {
            Some(kind) => {
                kinds.insert(kind);
            }
            None => warn!(rule_id = %rule.id, group = %group, "group has no digest, skipping"),
        }
    }
    Ok(kinds)
}

#[async_trait]
impl ScheduledJob for EngineCore {
    async fn run(&self, rule_id: &str) -> Result<()> {
        self.run_rule(rule_id).await.map(|_| ())
    }

    async fn next_cron(&self, rule_id: &str, current: &str) -> Option<String> {
        match self.store.get_rule(rule_id).await {
            Ok(Some(rule)) if rule.enabled => rule.schedule().map(|s| s.cron.clone()),
            Ok(_) => None,
            Err(e) => {
                warn!(rule_id = %rule_id, error = %e, "rule store unavailable, keeping current schedule");
                Some(current.to_string())
            }
        }
    }
}

pub struct NotificationEngine {
    core: Arc<EngineCore>,
    resolver: RuleResolver,
    scheduler: TaskScheduler,
}

impl NotificationEngine {
    /// Engine on the current Tokio runtime.
    pub fn new(
        store: Arc<dyn RuleStore>,
        findings: Arc<dyn FindingProvider>,
        dispatcher: Arc<Dispatcher>,
        matching: LevelMatching,
    ) -> Result<Self> {
        let core = Arc::new(EngineCore {
            store: Arc::clone(&store),
            aggregator: DigestAggregator::new(findings),
            dispatcher,
        });
        let scheduler = TaskScheduler::new(core.clone())?;
        Ok(Self {
            core,
            resolver: RuleResolver::new(store, matching),
            scheduler,
        })
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn resolver(&self) -> &RuleResolver {
        &self.resolver
    }

    /// Resolve `event` and dispatch it to every matched rule.
    pub async fn handle_event(&self, event: &Event) -> Result<Vec<DispatchResult>> {
        let rules = self.resolver.resolve(event).await?;
        if rules.is_empty() {
            debug!(group = %event.group, level = %event.level, "no rule matched event");
            return Ok(Vec::new());
        }
        Ok(self.core.dispatcher.dispatch_all(&rules, event).await)
    }

    /// Run scheduled rule `rule_id` now, outside the scheduler.
    pub async fn run_scheduled(&self, rule_id: &str) -> Result<Option<RunReport>> {
        self.core.run_rule(rule_id).await
    }

    /// Bring the scheduler in line with the store's scheduled rules.
    ///
    /// Enabled rules without a live handle are armed, changed cron
    /// expressions re-armed, and handles of removed or disabled rules
    /// cancelled. A rule with an invalid cron expression is logged and left
    /// unscheduled.
    pub async fn sync_schedules(&self) -> Result<SyncReport> {
        let rules = self.core.store.list_scheduled_rules().await?;
        let wanted: HashMap<&str, &str> = rules
            .iter()
            .filter(|r| r.enabled)
            .filter_map(|r| r.schedule().map(|s| (r.id.as_str(), s.cron.as_str())))
            .collect();

        let mut report = SyncReport::default();
        for id in self.scheduler.scheduled_ids() {
            if !wanted.contains_key(id.as_str()) && self.scheduler.cancel(&id) {
                info!(rule_id = %id, "unscheduled rule");
                report.cancelled += 1;
            }
        }

        for rule in rules.iter().filter(|r| wanted.contains_key(r.id.as_str())) {
            let cron = wanted[rule.id.as_str()];
            let rearm = match self.scheduler.task(&rule.id).map(|t| t.kind) {
                None => false,
                Some(TaskKind::Recurring { cron: live }) if live == cron => continue,
                Some(TaskKind::Recurring { .. }) => true,
                // A forced run re-syncs when it finishes.
                Some(TaskKind::OneShot) => continue,
            };

            match self.scheduler.schedule_next(&rule.id, cron) {
                Ok(next) => {
                    info!(rule_id = %rule.id, cron = %cron, next_fire = %next, "scheduled rule");
                    if rearm {
                        report.rearmed += 1;
                    } else {
                        report.armed += 1;
                    }
                }
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "rule is not schedulable");
                    self.scheduler.cancel(&rule.id);
                    report.invalid += 1;
                }
            }
        }

        debug!(?report, "schedules synchronized");
        Ok(report)
    }

    /// Run scheduled rule `rule_id` right away through the scheduler, wait
    /// for it, then restore its regular schedule.
    pub async fn force_run(&self, rule_id: &str) -> Result<()> {
        let rule = self
            .core
            .store
            .get_rule(rule_id)
            .await?
            .ok_or_else(|| VigilError::RuleNotFound(rule_id.to_string()))?;
        if rule.schedule().is_none() {
            return Err(RuleError::Validation(format!(
                "rule '{rule_id}' is not schedule-triggered"
            )));
        }

        info!(rule_id = %rule_id, "forcing scheduled run");
        self.scheduler.schedule_once(rule_id, Duration::ZERO).wait().await;
        self.sync_schedules().await?;
        Ok(())
    }

    /// Cancel all timers and wait up to `timeout` for in-flight runs.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.scheduler.shutdown(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;
    use vigil_core::{
        ComponentRef, Finding, PolicyViolation, Project, ProjectRef, ScheduleSpec, Scope, Severity,
        ViolationType, VulnerabilityRef,
    };
    use vigil_notify::{PublishContext, PublishError, Publisher, PublisherRegistry, PublisherSettings};

    use crate::catalog::Catalog;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct Recorder {
        count: AtomicUsize,
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(
            &self,
            _ctx: &PublishContext,
            event: &Event,
            _settings: &PublisherSettings,
        ) -> std::result::Result<(), PublishError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    struct Fixture {
        engine: NotificationEngine,
        store: Arc<MemoryStore>,
        recorder: Arc<Recorder>,
    }

    fn fixture(rules: Vec<Rule>, findings: Vec<Finding>, violations: Vec<PolicyViolation>) -> Fixture {
        let catalog = Arc::new(Catalog::from_parts(vec![], findings, violations));
        let store = Arc::new(MemoryStore::with_rules(catalog.clone(), rules));
        let recorder = Arc::new(Recorder::default());
        let mut registry = PublisherRegistry::new();
        registry.register(recorder.clone());
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)));
        let engine =
            NotificationEngine::new(store.clone(), catalog, dispatcher, LevelMatching::Legacy).unwrap();
        Fixture {
            engine,
            store,
            recorder,
        }
    }

    fn digest_rule(id: &str, groups: &[Group], since: DateTime<Utc>, skip_unchanged: bool) -> Rule {
        Rule::new(id, Scope::Portfolio, Level::Informational, "recorder")
            .notify_on(groups.iter().copied())
            .scheduled(ScheduleSpec {
                cron: "0 8 * * *".into(),
                last_execution_time: since,
                skip_unchanged,
            })
    }

    fn finding(project: &ProjectRef, at: DateTime<Utc>) -> Finding {
        Finding {
            project: project.clone(),
            component: Some(ComponentRef::new(Uuid::new_v4(), "openssl")),
            vulnerability: VulnerabilityRef::new("CVE-2022-3602", "NVD"),
            severity: Severity::Critical,
            attributed_on: at,
            analysis_state: None,
            suppressed: false,
        }
    }

    #[tokio::test]
    async fn handle_event_dispatches_matched_rules() {
        let rule = Rule::new("r1", Scope::Portfolio, Level::Warning, "recorder")
            .notify_on([Group::BomProcessed]);
        let f = fixture(vec![rule], vec![], vec![]);

        let hit = Event::new(Scope::Portfolio, Group::BomProcessed, Level::Informational);
        let results = f.engine.handle_event(&hit).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);

        let miss = Event::new(Scope::Portfolio, Group::BomConsumed, Level::Informational);
        assert!(f.engine.handle_event(&miss).await.unwrap().is_empty());
        assert_eq!(f.recorder.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scheduled_run_publishes_digest_and_moves_window() {
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let p = ProjectRef::new(Uuid::new_v4(), "shop", None);
        let f = fixture(
            vec![digest_rule("daily", &[Group::NewVulnerabilitiesSummary], t0, false)],
            vec![finding(&p, t0 + ChronoDuration::minutes(5))],
            vec![],
        );

        let report = f.engine.run_scheduled("daily").await.unwrap().unwrap();
        assert_eq!(report.processed, vec![DigestKind::Vulnerabilities]);
        assert_eq!(report.published, 1);

        let events = f.recorder.events.lock().unwrap().clone();
        assert_eq!(events[0].group, Group::NewVulnerabilitiesSummary);
        assert_eq!(events[0].level, Level::Informational);
        assert_eq!(events[0].title, "New Vulnerabilities Summary");
        match &events[0].subject {
            Subject::VulnerabilityDigest(d) => assert_eq!(d.overview.total, 1),
            other => panic!("expected vulnerability digest, got {other:?}"),
        }

        let rule = f.store.get_rule("daily").await.unwrap().unwrap();
        assert!(rule.schedule().unwrap().last_execution_time > t0);
    }

    #[tokio::test]
    async fn skip_unchanged_withholds_empty_digest() {
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let f = fixture(
            vec![digest_rule(
                "quiet",
                &[Group::NewVulnerabilitiesSummary, Group::NewPolicyViolationsSummary],
                t0,
                true,
            )],
            vec![],
            vec![],
        );

        let report = f.engine.run_scheduled("quiet").await.unwrap().unwrap();
        assert_eq!(report.processed.len(), 2);
        assert_eq!(report.skipped_unchanged, 2);
        assert_eq!(f.recorder.count.load(Ordering::SeqCst), 0);

        // The window still moves forward.
        let rule = f.store.get_rule("quiet").await.unwrap().unwrap();
        assert!(rule.schedule().unwrap().last_execution_time > t0);
    }

    #[tokio::test]
    async fn empty_digest_is_published_without_skip_unchanged() {
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let f = fixture(
            vec![digest_rule("loud", &[Group::PolicyViolation], t0, false)],
            vec![],
            vec![],
        );

        let report = f.engine.run_scheduled("loud").await.unwrap().unwrap();
        assert_eq!(report.processed, vec![DigestKind::PolicyViolations]);
        assert_eq!(report.published, 1);
        let events = f.recorder.events.lock().unwrap().clone();
        assert_eq!(events[0].title, "New Policy Violations Summary");
    }

    #[tokio::test]
    async fn policy_digest_carries_violations() {
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let p = ProjectRef::new(Uuid::new_v4(), "shop", None);
        let violation = PolicyViolation {
            project: p.clone(),
            component: None,
            policy_name: "no-gpl".into(),
            condition: None,
            violation_type: ViolationType::License,
            timestamp: t0 + ChronoDuration::minutes(1),
            analysis_state: None,
            suppressed: false,
        };
        let f = fixture(
            vec![digest_rule("policies", &[Group::NewPolicyViolationsSummary], t0, true)],
            vec![],
            vec![violation],
        );

        let report = f.engine.run_scheduled("policies").await.unwrap().unwrap();
        assert_eq!(report.published, 1);
        let events = f.recorder.events.lock().unwrap().clone();
        match &events[0].subject {
            Subject::PolicyViolationDigest(d) => {
                assert_eq!(d.overview.by_category[&ViolationType::License], 1)
            }
            other => panic!("expected policy digest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_or_missing_rule_is_skipped() {
        let mut rule = digest_rule("off", &[Group::NewVulnerabilitiesSummary], Utc::now(), false);
        rule.enabled = false;
        let f = fixture(vec![rule], vec![], vec![]);

        assert!(f.engine.run_scheduled("off").await.unwrap().is_none());
        assert!(f.engine.run_scheduled("ghost").await.unwrap().is_none());
        assert!(f.engine.core.next_cron("off", "0 8 * * *").await.is_none());
    }

    #[tokio::test]
    async fn unrelated_groups_are_not_processed() {
        let t0 = Utc::now() - ChronoDuration::hours(1);
        let f = fixture(vec![digest_rule("odd", &[Group::BomProcessed], t0, false)], vec![], vec![]);

        let report = f.engine.run_scheduled("odd").await.unwrap().unwrap();
        assert!(report.processed.is_empty());
        let rule = f.store.get_rule("odd").await.unwrap().unwrap();
        assert_eq!(rule.schedule().unwrap().last_execution_time, t0);
    }

    #[tokio::test]
    async fn sync_schedules_arms_rearms_and_cancels() {
        let since = Utc::now();
        let mut disabled = digest_rule("disabled", &[Group::NewVulnerabilitiesSummary], since, false);
        disabled.enabled = false;
        let mut broken = digest_rule("broken", &[Group::NewVulnerabilitiesSummary], since, false);
        if let vigil_core::Trigger::Schedule(spec) = &mut broken.trigger {
            spec.cron = "whenever".into();
        }
        let f = fixture(
            vec![
                digest_rule("daily", &[Group::NewVulnerabilitiesSummary], since, false),
                disabled,
                broken,
                Rule::new("event", Scope::Portfolio, Level::Error, "recorder"),
            ],
            vec![],
            vec![],
        );
        f.engine.scheduler().schedule_next("stale", "0 0 1 1 *").unwrap();

        let report = f.engine.sync_schedules().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                armed: 1,
                rearmed: 0,
                cancelled: 1,
                invalid: 1
            }
        );
        assert_eq!(f.engine.scheduler().scheduled_ids(), vec!["daily".to_string()]);

        // Unchanged rules are left alone; a changed cron is re-armed.
        assert_eq!(
            f.engine.sync_schedules().await.unwrap(),
            SyncReport {
                invalid: 1,
                ..SyncReport::default()
            }
        );
        f.store.upsert(Rule {
            trigger: vigil_core::Trigger::Schedule(ScheduleSpec {
                cron: "0 9 * * *".into(),
                last_execution_time: since,
                skip_unchanged: false,
            }),
            ..digest_rule("daily", &[Group::NewVulnerabilitiesSummary], since, false)
        });
        assert_eq!(f.engine.sync_schedules().await.unwrap().rearmed, 1);
        f.engine.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn force_run_runs_now_and_restores_schedule() {
        let t0 = Utc::now() - ChronoDuration::hours(1);
        let p = ProjectRef::new(Uuid::new_v4(), "shop", None);
        let f = fixture(
            vec![digest_rule("daily", &[Group::NewVulnerability], t0, false)],
            vec![finding(&p, t0 + ChronoDuration::minutes(1))],
            vec![],
        );

        f.engine.force_run("daily").await.unwrap();
        assert_eq!(f.recorder.count.load(Ordering::SeqCst), 1);
        let task = f.engine.scheduler().task("daily").expect("schedule restored");
        assert!(matches!(task.kind, TaskKind::Recurring { .. }));
        f.engine.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn force_run_rejects_event_rules() {
        let f = fixture(
            vec![Rule::new("event", Scope::Portfolio, Level::Error, "recorder")],
            vec![],
            vec![],
        );
        assert!(matches!(f.engine.force_run("event").await, Err(RuleError::Validation(_))));
        assert!(matches!(
            f.engine.force_run("ghost").await,
            Err(RuleError::Core(VigilError::RuleNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn scoped_digest_ignores_other_projects() {
        let t0 = Utc::now() - ChronoDuration::hours(1);
        let mine = Project::new(Uuid::new_v4(), "mine");
        let theirs = ProjectRef::new(Uuid::new_v4(), "theirs", None);
        let rule = digest_rule("scoped", &[Group::NewVulnerabilitiesSummary], t0, true)
            .limited_to(vec![mine], false);
        let f = fixture(vec![rule], vec![finding(&theirs, t0 + ChronoDuration::minutes(1))], vec![]);

        let report = f.engine.run_scheduled("scoped").await.unwrap().unwrap();
        assert_eq!(report.skipped_unchanged, 1);
        assert_eq!(f.recorder.count.load(Ordering::SeqCst), 0);
    }

    struct DownProvider;

    #[async_trait]
    impl FindingProvider for DownProvider {
        async fn findings_since(&self, _since: DateTime<Utc>, _suppressed: bool) -> Result<Vec<Finding>> {
            Err(RuleError::Store("finding database unreachable".into()))
        }

        async fn policy_violations_since(
            &self,
            _since: DateTime<Utc>,
            _suppressed: bool,
        ) -> Result<Vec<PolicyViolation>> {
            Ok(Vec::new())
        }

        async fn current_findings(&self, _project: Uuid) -> Result<Vec<Finding>> {
            Ok(Vec::new())
        }

        async fn current_violations(&self, _project: Uuid) -> Result<Vec<PolicyViolation>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn provider_failure_abandons_cycle_and_keeps_schedule() {
        let t0 = Utc::now() - ChronoDuration::hours(1);
        let rule = digest_rule(
            "daily",
            &[Group::NewPolicyViolationsSummary, Group::NewVulnerabilitiesSummary],
            t0,
            false,
        );
        let store = Arc::new(MemoryStore::with_rules(Arc::new(Catalog::default()), vec![rule]));
        let recorder = Arc::new(Recorder::default());
        let mut registry = PublisherRegistry::new();
        registry.register(recorder.clone());
        let engine = NotificationEngine::new(
            store.clone(),
            Arc::new(DownProvider),
            Arc::new(Dispatcher::new(Arc::new(registry))),
            LevelMatching::Legacy,
        )
        .unwrap();

        assert!(matches!(engine.run_scheduled("daily").await, Err(RuleError::Store(_))));
        assert_eq!(recorder.count.load(Ordering::SeqCst), 0);
        let rule = store.get_rule("daily").await.unwrap().unwrap();
        assert_eq!(rule.schedule().unwrap().last_execution_time, t0);
        assert_eq!(
            engine.core.next_cron("daily", "0 8 * * *").await.as_deref(),
            Some("0 8 * * *")
        );
    }
}
