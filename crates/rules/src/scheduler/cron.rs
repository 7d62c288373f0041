//! Cron parsing and next-fire computation.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, RuleError};

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Rules use standard 5-field cron: `min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6-field or non-standard; pass through as-is.
        trimmed.to_string()
    }
}

pub fn parse_cron(expression: &str) -> Result<Schedule> {
    Schedule::from_str(&normalize_cron(expression)).map_err(|e| RuleError::Cron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Next fire time strictly after `after`, with the delay from `after` to it.
pub fn next_fire(expression: &str, after: DateTime<Utc>) -> Result<(DateTime<Utc>, Duration)> {
    let schedule = parse_cron(expression)?;
    let next = schedule.after(&after).next().ok_or_else(|| RuleError::Cron {
        expression: expression.to_string(),
        reason: "no upcoming fire time".to_string(),
    })?;
    Ok((next, delay_until(next, after)))
}

/// Time from `now` until `at`, zero when `at` has passed.
pub fn delay_until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
