//! Filesystem rule loader with hot-reload via `notify` watcher.
//!
//! Watches the rules directory for YAML file changes (create, modify, delete)
//! and reloads affected rules into the in-memory rule set.

mod core;
mod error;
mod schema;
mod watcher;


pub use self::core::RuleLoader;
pub use self::error::{LoadResult, LoadStatus};
pub use self::schema::{NotificationRuleDoc, RuleMetadata, RuleSpec, ScheduleDoc};
