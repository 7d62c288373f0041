//! Scheduled task manager for schedule-triggered rules.
//!
//! [`TaskScheduler`] owns one timer per rule id on the shared Tokio runtime
//! and calls a [`ScheduledJob`] when it fires. Recurring tasks re-arm from
//! the job's current cron expression after every run, failed or not.

mod core;
pub(crate) mod cron;
mod handle;

#[cfg(test)]
mod tests;

pub use self::core::{ScheduledJob, TaskScheduler};
pub use self::cron::{delay_until, next_fire, parse_cron};
pub use self::handle::{DoneSignal, TaskInfo, TaskKind, TaskState};
