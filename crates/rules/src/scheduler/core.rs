//! [`TaskScheduler`]: one timer per scheduled rule on a shared runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::{Result, RuleError};

use super::cron::next_fire;
use super::handle::{DoneSignal, ScheduledTaskHandle, TaskInfo, TaskKind, TaskSignals, TaskState};

/// Longest single timer; longer delays are slept in steps of this size.
const MAX_SLEEP_STEP: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Sleep for `delay`, which may exceed the Tokio timer's maximum duration.
pub(crate) async fn sleep_for(delay: Duration) {
    let mut remaining = delay;
    loop {
        let step = remaining.min(MAX_SLEEP_STEP);
        tokio::time::sleep(step).await;
        remaining -= step;
        if remaining.is_zero() {
            break;
        }
    }
}

/// Work performed when a scheduled rule fires.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Run rule `rule_id` once. Errors are logged by the scheduler.
    async fn run(&self, rule_id: &str) -> Result<()>;

    /// The cron expression to re-arm `rule_id` with, or `None` when the rule
    /// should stop firing (deleted, disabled, no longer scheduled). `current`
    /// is the expression the finished run was armed with.
    async fn next_cron(&self, rule_id: &str, current: &str) -> Option<String>;
}

#[derive(Default)]
struct Registry {
    handles: HashMap<String, ScheduledTaskHandle>,
    next_generation: u64,
}

impl Registry {
    fn is_current(&self, rule_id: &str, generation: u64) -> bool {
        self.handles
            .get(rule_id)
            .is_some_and(|h| h.info.generation == generation)
    }
}

struct Inner {
    runtime: Handle,
    job: Arc<dyn ScheduledJob>,
    registry: Mutex<Registry>,
}

/// Keeps at most one live timer per rule id.
///
/// Arming a rule replaces (and cancels) whatever handle it had. Timers are
/// Tokio tasks on one shared runtime. A finished recurring run re-arms only
/// if its handle is still the registered one, so a rule cancelled or
/// re-scheduled mid-run is never armed twice.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

impl TaskScheduler {
    /// Scheduler on the current Tokio runtime.
    pub fn new(job: Arc<dyn ScheduledJob>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| RuleError::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(job, runtime))
    }

    pub fn with_runtime(job: Arc<dyn ScheduledJob>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                job,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Arm `rule_id` for the next fire time of `cron`, replacing any live handle.
    ///
    /// An unparseable expression leaves the registry untouched.
    pub fn schedule_next(&self, rule_id: &str, cron: &str) -> Result<DateTime<Utc>> {
        let (next, delay) = next_fire(cron, Utc::now())?;
        let mut registry = self.inner.registry.lock().expect("scheduler registry lock poisoned");
        self.inner.arm(
            &mut registry,
            rule_id,
            TaskKind::Recurring {
                cron: cron.to_string(),
            },
            next,
            delay,
        );
        Ok(next)
    }

    /// Arm a single run of `rule_id` after `delay`, replacing any live handle.
    ///
    /// The returned signal resolves once that run has finished.
    pub fn schedule_once(&self, rule_id: &str, delay: Duration) -> DoneSignal {
        let next = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let mut registry = self.inner.registry.lock().expect("scheduler registry lock poisoned");
        self.inner.arm(&mut registry, rule_id, TaskKind::OneShot, next, delay)
    }

    /// Cancel and remove the handle of `rule_id`. Unknown ids are a no-op.
    pub fn cancel(&self, rule_id: &str) -> bool {
        let removed = self
            .inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .remove(rule_id);
        match removed {
            Some(handle) => {
                handle.cancel();
                debug!(rule_id = %rule_id, generation = handle.info.generation, "cancelled scheduled task");
                true
            }
            None => false,
        }
    }

    /// Cancel and remove every handle, returning their done signals.
    pub fn cancel_all(&self) -> Vec<DoneSignal> {
        let drained: Vec<ScheduledTaskHandle> = self
            .inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        if !drained.is_empty() {
            info!(count = drained.len(), "cancelled all scheduled tasks");
        }
        drained
            .iter()
            .map(|handle| {
                handle.cancel();
                handle.done_signal()
            })
            .collect()
    }

    /// Cancel everything and wait up to `timeout` for in-flight runs.
    ///
    /// Returns `false` if some run was still going when the timeout hit.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let pending = self.cancel_all();
        let wait_all = async {
            for signal in pending {
                signal.wait().await;
            }
        };
        match tokio::time::timeout(timeout, wait_all).await {
            Ok(()) => true,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "scheduled runs still in flight at shutdown");
                false
            }
        }
    }

    pub fn is_scheduled(&self, rule_id: &str) -> bool {
        self.inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .contains_key(rule_id)
    }

    pub fn task(&self, rule_id: &str) -> Option<TaskInfo> {
        self.inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .get(rule_id)
            .map(|h| h.info().clone())
    }

    /// Signal for the current cycle of `rule_id`.
    pub fn done_signal(&self, rule_id: &str) -> Option<DoneSignal> {
        self.inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .get(rule_id)
            .map(ScheduledTaskHandle::done_signal)
    }

    /// Ids with a live handle, sorted.
    pub fn scheduled_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner
            .registry
            .lock()
            .expect("scheduler registry lock poisoned")
            .handles
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    /// Register a fresh handle for `rule_id` and spawn its timer.
    fn arm(
        self: &Arc<Self>,
        registry: &mut Registry,
        rule_id: &str,
        kind: TaskKind,
        next_fire: DateTime<Utc>,
        delay: Duration,
    ) -> DoneSignal {
        registry.next_generation += 1;
        let generation = registry.next_generation;
        let (handle, signals) = ScheduledTaskHandle::new(TaskInfo {
            rule_id: rule_id.to_string(),
            generation,
            kind,
            next_fire,
            state: TaskState::Scheduled,
        });
        let done = handle.done_signal();

        if let Some(previous) = registry.handles.insert(rule_id.to_string(), handle) {
            previous.cancel();
            debug!(
                rule_id = %rule_id,
                previous = previous.info.generation,
                generation,
                "replaced scheduled task"
            );
        }
        debug!(rule_id = %rule_id, generation, next_fire = %next_fire, delay_ms = delay.as_millis() as u64, "armed");

        let inner = Arc::clone(self);
        let rule_id = rule_id.to_string();
        self.runtime
            .spawn(async move { inner.run_task(rule_id, generation, delay, signals).await });
        done
    }

    async fn run_task(self: Arc<Self>, rule_id: String, generation: u64, delay: Duration, signals: TaskSignals) {
        let TaskSignals { mut cancel, done } = signals;

        let cancelled = tokio::select! {
            _ = sleep_for(delay) => false,
            _ = cancel.changed() => true,
        };
        let kind = if cancelled { None } else { self.begin_run(&rule_id, generation) };
        let Some(kind) = kind else {
            debug!(rule_id = %rule_id, generation, "scheduled task cancelled before firing");
            let _ = done.send(true);
            return;
        };

        if let Err(e) = self.job.run(&rule_id).await {
            warn!(rule_id = %rule_id, error = %e, "scheduled run failed, keeping schedule");
        }

        match kind {
            TaskKind::Recurring { cron } => match self.job.next_cron(&rule_id, &cron).await {
                Some(cron) => self.rearm(&rule_id, generation, &cron),
                None => self.retire(&rule_id, generation, "rule no longer scheduled"),
            },
            TaskKind::OneShot => self.retire(&rule_id, generation, "one-shot run finished"),
        }
        let _ = done.send(true);
    }

    /// Mark the handle running if it is still the live one.
    fn begin_run(&self, rule_id: &str, generation: u64) -> Option<TaskKind> {
        let mut registry = self.registry.lock().expect("scheduler registry lock poisoned");
        let handle = registry
            .handles
            .get_mut(rule_id)
            .filter(|h| h.info.generation == generation)?;
        handle.info.state = TaskState::Running;
        Some(handle.info.kind.clone())
    }

    fn rearm(self: &Arc<Self>, rule_id: &str, generation: u64, cron: &str) {
        let mut registry = self.registry.lock().expect("scheduler registry lock poisoned");
        if !registry.is_current(rule_id, generation) {
            debug!(rule_id = %rule_id, generation, "superseded during run, not re-arming");
            return;
        }
        match next_fire(cron, Utc::now()) {
            Ok((next, delay)) => {
                self.arm(
                    &mut registry,
                    rule_id,
                    TaskKind::Recurring {
                        cron: cron.to_string(),
                    },
                    next,
                    delay,
                );
            }
            Err(e) => {
                warn!(rule_id = %rule_id, error = %e, "cannot re-arm scheduled rule");
                registry.handles.remove(rule_id);
            }
        }
    }

    fn retire(&self, rule_id: &str, generation: u64, reason: &str) {
        let mut registry = self.registry.lock().expect("scheduler registry lock poisoned");
        if registry.is_current(rule_id, generation) {
            registry.handles.remove(rule_id);
            debug!(rule_id = %rule_id, generation, reason, "removed scheduled task");
        }
    }
}
