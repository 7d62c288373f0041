//! Routes a matched rule's event to the publisher the rule names.
//!
//! The dispatcher looks the publisher up in the [`PublisherRegistry`], parses
//! the rule's publisher config, and hands both over together with the
//! [`PublishContext`]. Any failure is logged and reported in the
//! [`DispatchResult`]; it never stops the caller from dispatching other rules.

use std::sync::Arc;

use vigil_core::{Event, Rule};

use crate::registry::PublisherRegistry;
use crate::traits::{parse_settings, DispatchResult, PublishContext};

pub struct Dispatcher {
    registry: Arc<PublisherRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<PublisherRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    /// Dispatch `event` for a single matched rule.
    pub async fn dispatch(&self, rule: &Rule, event: &Event) -> DispatchResult {
        let start = std::time::Instant::now();
        let ctx = PublishContext::from_event(event).with_rule(rule);

        let failed = |error: String| DispatchResult {
            rule_id: rule.id.clone(),
            publisher: rule.publisher_ref.clone(),
            success: false,
            error: Some(error),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let settings = match parse_settings(rule.publisher_config.as_deref()) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(
                    rule_id = %rule.id,
                    publisher = %rule.publisher_ref,
                    error = %e,
                    "failed to prepare publisher configuration, skipping rule"
                );
                return failed(e.to_string());
            }
        };

        let publisher = match self.registry.resolve(&rule.publisher_ref) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(
                    rule_id = %rule.id,
                    error = %e,
                    "failed to resolve notification publisher, skipping rule"
                );
                return failed(e.to_string());
            }
        };

        let result = publisher.publish(&ctx, event, &settings).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                if ctx.log_success {
                    tracing::info!(
                        rule_id = %rule.id,
                        publisher = publisher.name(),
                        group = %event.group,
                        duration_ms,
                        "Notification published"
                    );
                } else {
                    tracing::debug!(
                        rule_id = %rule.id,
                        publisher = publisher.name(),
                        duration_ms,
                        "Notification published"
                    );
                }
                DispatchResult {
                    rule_id: rule.id.clone(),
                    publisher: publisher.name().to_string(),
                    success: true,
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!(
                    rule_id = %rule.id,
                    publisher = publisher.name(),
                    error = %e,
                    duration_ms,
                    "Notification publishing failed"
                );
                DispatchResult {
                    rule_id: rule.id.clone(),
                    publisher: publisher.name().to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }

    /// Dispatch `event` to every rule in order. Individual failures don't
    /// block later rules.
    pub async fn dispatch_all(&self, rules: &[Rule], event: &Event) -> Vec<DispatchResult> {
        let mut results = Vec::with_capacity(rules.len());
        for rule in rules {
            results.push(self.dispatch(rule, event).await);
        }
        results
    }
}
