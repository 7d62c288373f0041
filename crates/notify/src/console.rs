//! Publisher that writes notifications to the log.

use crate::traits::{PublishContext, PublishError, Publisher, PublisherSettings};
use vigil_core::Event;

/// Logs every notification at `info` level. Needs no configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePublisher;

#[async_trait::async_trait]
impl Publisher for ConsolePublisher {
    async fn publish(
        &self,
        ctx: &PublishContext,
        event: &Event,
        _settings: &PublisherSettings,
    ) -> Result<(), PublishError> {
        tracing::info!(
            rule = ctx.rule_name.as_deref().unwrap_or("-"),
            group = %ctx.group,
            level = %ctx.level,
            scope = %ctx.scope,
            timestamp = %ctx.timestamp,
            title = %event.title,
            "{}",
            event.content
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
