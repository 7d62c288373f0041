//! Generic HTTP webhook publisher.
//!
//! Delivers notifications as JSON payloads to the destination named in the
//! rule's publisher config, with optional HTTP method and custom headers.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::traits::{PublishContext, PublishError, Publisher, PublisherSettings};
use vigil_core::Event;

/// Per-rule webhook settings read from the publisher config.
///
/// ```json
/// { "destination": "https://${HOOK_HOST}/notify", "method": "PUT",
///   "headers": { "X-Api-Key": "${HOOK_KEY}" } }
/// ```
///
/// Environment variable references (`${VAR_NAME}`) in the destination and
/// header values are resolved when the settings are read.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookTarget {
    pub url: String,
    pub method: reqwest::Method,
    pub headers: HashMap<String, String>,
}

impl WebhookTarget {
    pub fn from_settings(settings: &PublisherSettings) -> Result<Self, PublishError> {
        let url = settings
            .get("destination")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PublishError::Config("webhook requires a 'destination'".to_string()))?;

        let method = match settings.get("method").and_then(Value::as_str) {
            Some(m) => m
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|_| PublishError::Config(format!("invalid HTTP method: {m}")))?,
            None => reqwest::Method::POST,
        };

        let mut headers = HashMap::new();
        if let Some(raw) = settings.get("headers") {
            let map = raw
                .as_object()
                .ok_or_else(|| PublishError::Config("webhook 'headers' must be an object".to_string()))?;
            for (key, value) in map {
                let value = value.as_str().ok_or_else(|| {
                    PublishError::Config(format!("webhook header '{key}' must be a string"))
                })?;
                headers.insert(key.clone(), resolve_env_vars(value)?);
            }
        }

        Ok(Self {
            url: resolve_env_vars(url)?,
            method,
            headers,
        })
    }
}

/// Posts the publish context and event as JSON to a per-rule destination.
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookPublisher {
    pub fn new(timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(
        &self,
        ctx: &PublishContext,
        event: &Event,
        settings: &PublisherSettings,
    ) -> Result<(), PublishError> {
        let target = WebhookTarget::from_settings(settings)?;

        let body = serde_json::json!({
            "context": ctx,
            "notification": event,
        });

        let mut request = self
            .client
            .request(target.method.clone(), &target.url)
            .json(&body);

        for (key, value) in &target.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %target.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(PublishError::Delivery(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(
            url = %target.url,
            method = %target.method,
            status = %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, PublishError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(PublishError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name).map_err(|_| {
                PublishError::Config(format!("env var not found: {var_name}"))
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
