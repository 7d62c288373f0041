//! Tests for the scheduler module.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::error::{Result, RuleError};

/// Far enough away that it never fires during a test.
const YEARLY: &str = "0 0 1 1 *";
const EVERY_SECOND: &str = "* * * * * *";

struct MockJob {
    runs: AtomicUsize,
    finished: AtomicUsize,
    fail: AtomicBool,
    stop: AtomicBool,
    run_time: Duration,
    started: Notify,
    cron: String,
}

impl MockJob {
    fn new(cron: &str) -> Arc<Self> {
        Self::slow(cron, Duration::ZERO)
    }

    fn slow(cron: &str, run_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            run_time,
            started: Notify::new(),
            cron: cron.to_string(),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduledJob for MockJob {
    async fn run(&self, rule_id: &str) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if !self.run_time.is_zero() {
            tokio::time::sleep(self.run_time).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RuleError::Store(format!("provider down for {rule_id}")));
        }
        Ok(())
    }

    async fn next_cron(&self, _rule_id: &str, _current: &str) -> Option<String> {
        if self.stop.load(Ordering::SeqCst) {
            None
        } else {
            Some(self.cron.clone())
        }
    }
}

fn scheduler(job: &Arc<MockJob>) -> TaskScheduler {
    TaskScheduler::new(job.clone()).unwrap()
}

async fn wait(signal: DoneSignal) {
    tokio::time::timeout(Duration::from_secs(5), signal.wait())
        .await
        .expect("task did not finish in time");
}

// ── registry invariants ─────────────────────────────────────────

#[tokio::test]
async fn schedule_next_twice_keeps_one_handle() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);

    sched.schedule_next("digest", YEARLY).unwrap();
    let first = sched.task("digest").unwrap();
    let first_done = sched.done_signal("digest").unwrap();
    sched.schedule_next("digest", YEARLY).unwrap();

    assert_eq!(sched.len(), 1);
    let second = sched.task("digest").unwrap();
    assert!(second.generation > first.generation);
    assert_eq!(second.state, TaskState::Scheduled);

    // The replaced timer was cancelled, not left running.
    wait(first_done).await;
    assert_eq!(job.runs(), 0);
}

#[tokio::test]
async fn cancel_unknown_id_is_noop() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);
    sched.schedule_next("a", YEARLY).unwrap();

    assert!(!sched.cancel("unknown-id"));
    assert!(!sched.cancel("unknown-id"));
    assert_eq!(sched.scheduled_ids(), vec!["a".to_string()]);
}

#[tokio::test]
async fn cancel_removes_handle_and_stops_timer() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);
    sched.schedule_next("a", YEARLY).unwrap();
    let done = sched.done_signal("a").unwrap();

    assert!(sched.cancel("a"));
    assert!(!sched.is_scheduled("a"));
    wait(done).await;
    assert_eq!(job.runs(), 0);
}

#[tokio::test]
async fn invalid_cron_leaves_registry_untouched() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);
    sched.schedule_next("a", YEARLY).unwrap();
    let before = sched.task("a").unwrap();

    assert!(matches!(
        sched.schedule_next("a", "not a cron"),
        Err(RuleError::Cron { .. })
    ));
    assert_eq!(sched.task("a").unwrap(), before);
    assert!(!sched.is_scheduled("b"));
}

#[tokio::test]
async fn cancel_all_clears_everything() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);
    for id in ["a", "b", "c"] {
        sched.schedule_next(id, YEARLY).unwrap();
    }

    let signals = sched.cancel_all();
    assert_eq!(signals.len(), 3);
    assert!(sched.is_empty());
    for signal in signals {
        wait(signal).await;
    }
    assert_eq!(job.runs(), 0);
}

#[test]
fn new_outside_runtime_fails() {
    let job = MockJob::new(YEARLY);
    assert!(matches!(TaskScheduler::new(job), Err(RuleError::Runtime(_))));
}

// ── one-shot runs (paused clock) ────────────────────────────────

#[tokio::test(start_paused = true)]
async fn schedule_once_runs_once_and_removes_handle() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);

    let done = sched.schedule_once("adhoc", Duration::from_secs(30));
    assert_eq!(sched.task("adhoc").unwrap().kind, TaskKind::OneShot);

    done.wait().await;
    assert_eq!(job.runs(), 1);
    assert!(!sched.is_scheduled("adhoc"));
}

#[tokio::test(start_paused = true)]
async fn schedule_once_waits_for_its_delay() {
    let job = MockJob::new(YEARLY);
    let sched = scheduler(&job);

    sched.schedule_once("adhoc", Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(job.runs(), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(job.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_does_not_abort_in_flight_run() {
    let job = MockJob::slow(YEARLY, Duration::from_secs(10));
    let sched = scheduler(&job);

    let done = sched.schedule_once("adhoc", Duration::ZERO);
    job.started.notified().await;
    assert_eq!(sched.task("adhoc").unwrap().state, TaskState::Running);

    assert!(sched.cancel("adhoc"));
    assert!(!done.is_done());
    done.wait().await;
    assert_eq!(job.finished.load(Ordering::SeqCst), 1);
    assert!(sched.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_run() {
    let job = MockJob::slow(YEARLY, Duration::from_secs(3));
    let sched = scheduler(&job);

    sched.schedule_once("adhoc", Duration::ZERO);
    sched.schedule_next("idle", YEARLY).unwrap();
    job.started.notified().await;

    assert!(sched.shutdown(Duration::from_secs(10)).await);
    assert_eq!(job.finished.load(Ordering::SeqCst), 1);
    assert!(sched.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sleep_for_outlasts_timer_limit() {
    // Tokio clamps a single timer to roughly 2.2 years.
    let three_years = Duration::from_secs(3 * 365 * 24 * 60 * 60);
    let start = tokio::time::Instant::now();

    super::core::sleep_for(three_years).await;

    assert!(start.elapsed() >= three_years);
}

#[tokio::test(start_paused = true)]
async fn shutdown_gives_up_after_timeout() {
    let job = MockJob::slow(YEARLY, Duration::from_secs(60));
    let sched = scheduler(&job);

    sched.schedule_once("adhoc", Duration::ZERO);
    job.started.notified().await;

    assert!(!sched.shutdown(Duration::from_secs(1)).await);
}

// ── recurring runs (wall clock, cron fires every second) ────────

#[tokio::test]
async fn recurring_task_rearms_after_run() {
    let job = MockJob::new(EVERY_SECOND);
    let sched = scheduler(&job);

    sched.schedule_next("digest", EVERY_SECOND).unwrap();
    let first = sched.task("digest").unwrap();
    wait(sched.done_signal("digest").unwrap()).await;

    assert_eq!(job.runs(), 1);
    let rearmed = sched.task("digest").expect("re-armed");
    assert!(rearmed.generation > first.generation);
    assert_eq!(
        rearmed.kind,
        TaskKind::Recurring {
            cron: EVERY_SECOND.to_string()
        }
    );
    sched.cancel_all();
}

#[tokio::test]
async fn failed_run_still_rearms() {
    let job = MockJob::new(EVERY_SECOND);
    job.fail.store(true, Ordering::SeqCst);
    let sched = scheduler(&job);

    sched.schedule_next("digest", EVERY_SECOND).unwrap();
    wait(sched.done_signal("digest").unwrap()).await;
    wait(sched.done_signal("digest").expect("re-armed after failure")).await;

    assert!(job.runs() >= 2);
    assert!(sched.is_scheduled("digest"));
    sched.cancel_all();
}

#[tokio::test]
async fn rule_gone_after_run_is_not_rearmed() {
    let job = MockJob::new(EVERY_SECOND);
    job.stop.store(true, Ordering::SeqCst);
    let sched = scheduler(&job);

    sched.schedule_next("digest", EVERY_SECOND).unwrap();
    wait(sched.done_signal("digest").unwrap()).await;

    assert_eq!(job.runs(), 1);
    assert!(!sched.is_scheduled("digest"));
}

#[tokio::test]
async fn unparsable_cron_after_run_drops_handle() {
    let job = MockJob::new("not a cron");
    let sched = scheduler(&job);

    sched.schedule_next("digest", EVERY_SECOND).unwrap();
    wait(sched.done_signal("digest").unwrap()).await;

    assert_eq!(job.runs(), 1);
    assert!(!sched.is_scheduled("digest"));
}

#[tokio::test]
async fn cancel_during_run_prevents_rearm() {
    let job = MockJob::slow(EVERY_SECOND, Duration::from_millis(200));
    let sched = scheduler(&job);

    sched.schedule_next("digest", EVERY_SECOND).unwrap();
    let done = sched.done_signal("digest").unwrap();
    tokio::time::timeout(Duration::from_secs(5), job.started.notified())
        .await
        .expect("run started");

    assert!(sched.cancel("digest"));
    wait(done).await;
    assert!(!sched.is_scheduled("digest"));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(job.runs(), 1);
}

#[tokio::test]
async fn reschedule_during_run_keeps_single_handle() {
    let job = MockJob::slow(EVERY_SECOND, Duration::from_millis(200));
    let sched = scheduler(&job);

    sched.schedule_next("digest", EVERY_SECOND).unwrap();
    let done = sched.done_signal("digest").unwrap();
    tokio::time::timeout(Duration::from_secs(5), job.started.notified())
        .await
        .expect("run started");

    sched.schedule_next("digest", YEARLY).unwrap();
    let replacement = sched.task("digest").unwrap();
    wait(done).await;

    // The finished run saw it was superseded and did not re-arm over it.
    assert_eq!(sched.len(), 1);
    assert_eq!(sched.task("digest").unwrap().generation, replacement.generation);
    sched.cancel_all();
}
