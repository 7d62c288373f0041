//! Notification rule engine.
//!
//! This crate provides:
//! - Rule resolution for incoming events (level, scope, group, project limits)
//! - Project scope limiting over the project hierarchy
//! - Digest aggregation for schedule-triggered rules
//! - A per-rule cron scheduler on a shared Tokio runtime
//! - A YAML rule loader with hot-reload via `notify` watcher
//! - [`NotificationEngine`] tying them to the publisher dispatcher

pub mod catalog;
pub mod digest;
pub mod engine;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod scheduler;
pub mod scope;
pub mod store;

pub use catalog::Catalog;
pub use digest::DigestAggregator;
pub use engine::{DigestKind, NotificationEngine, RunReport, SyncReport};
pub use error::{Result, RuleError};
pub use loader::{NotificationRuleDoc, RuleLoader};
pub use resolver::RuleResolver;
pub use scheduler::TaskScheduler;
pub use store::{FindingProvider, MemoryStore, RuleStore};
