//! Domain model shared by the notification routing crates.
//!
//! Events, rules, the project hierarchy, findings and policy violations, and
//! the digest payload built for schedule-triggered rules.

pub mod config;
pub mod digest;
pub mod error;
pub mod event;
pub mod finding;
pub mod project;
pub mod rule;

pub use config::{Config, LevelMatching};
pub use digest::*;
pub use error::*;
pub use event::*;
pub use finding::*;
pub use project::*;
pub use rule::*;
