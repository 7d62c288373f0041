//! Publisher dispatch for matched notification rules.
//!
//! This crate provides:
//! - `Publisher` trait for pluggable notification destinations
//! - `PublisherRegistry` mapping stable keys to publisher implementations
//! - Console and webhook publishers
//! - `Dispatcher` that hands a rule's event to its configured publisher

pub mod console;
pub mod dispatcher;
pub mod registry;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use registry::PublisherRegistry;
pub use traits::{DispatchResult, PublishContext, PublishError, Publisher, PublisherSettings};
