//! Capability map from publisher keys to publisher implementations.
//!
//! Publishers register under a stable string key at startup; dispatch is a
//! map lookup plus a trait call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use vigil_core::config::PublisherConfig;

use crate::console::ConsolePublisher;
use crate::traits::{PublishError, Publisher};
use crate::webhook::WebhookPublisher;

#[derive(Default)]
pub struct PublisherRegistry {
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `console` and `webhook` publishers.
    pub fn with_defaults(config: &PublisherConfig) -> Result<Self, PublishError> {
        let mut registry = Self::new();
        registry.register(Arc::new(ConsolePublisher));
        registry.register(Arc::new(WebhookPublisher::new(Duration::from_secs(
            config.webhook_timeout_secs,
        ))?));
        Ok(registry)
    }

    /// Register `publisher` under its own name, replacing any previous entry.
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        let key = publisher.name().to_string();
        self.register_as(key, publisher);
    }

    /// Register `publisher` under an explicit key.
    pub fn register_as(&mut self, key: impl Into<String>, publisher: Arc<dyn Publisher>) {
        let key = key.into();
        if self.publishers.insert(key.clone(), publisher).is_some() {
            tracing::debug!(publisher = %key, "replaced registered publisher");
        }
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<dyn Publisher>, PublishError> {
        self.publishers
            .get(key)
            .cloned()
            .ok_or_else(|| PublishError::UnknownPublisher(key.to_string()))
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.publishers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
