//! Registry entry for one scheduled rule.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Where a live task is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for its fire time.
    Scheduled,
    /// Fired; the job is running.
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Re-arms from `cron` after each run.
    Recurring { cron: String },
    /// Removes itself after a single run.
    OneShot,
}

/// Snapshot of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub rule_id: String,
    /// Increases every time the rule is (re-)armed.
    pub generation: u64,
    pub kind: TaskKind,
    pub next_fire: DateTime<Utc>,
    pub state: TaskState,
}

/// Resolves once the task that issued it has finished its current cycle:
/// cancelled while waiting, or run to completion.
#[derive(Debug, Clone)]
pub struct DoneSignal(watch::Receiver<bool>);

impl DoneSignal {
    pub async fn wait(mut self) {
        // A dropped sender means the task is gone.
        let _ = self.0.wait_for(|done| *done).await;
    }

    pub fn is_done(&self) -> bool {
        *self.0.borrow()
    }
}

/// The one live timer of a rule.
#[derive(Debug)]
pub struct ScheduledTaskHandle {
    pub(super) info: TaskInfo,
    cancel: watch::Sender<bool>,
    done: watch::Receiver<bool>,
}

/// Task-side ends of a handle's channels.
pub(super) struct TaskSignals {
    pub cancel: watch::Receiver<bool>,
    pub done: watch::Sender<bool>,
}

impl ScheduledTaskHandle {
    pub(super) fn new(info: TaskInfo) -> (Self, TaskSignals) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        (
            Self {
                info,
                cancel: cancel_tx,
                done: done_rx,
            },
            TaskSignals {
                cancel: cancel_rx,
                done: done_tx,
            },
        )
    }

    /// Interrupt the timer. A run already in progress is not aborted.
    pub(super) fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn done_signal(&self) -> DoneSignal {
        DoneSignal(self.done.clone())
    }

    pub fn info(&self) -> &TaskInfo {
        &self.info
    }
}
