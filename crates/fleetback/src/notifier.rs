//! Operator notifications

use async_trait::async_trait;
use fleetback_core::model::escape_html;
use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_MESSAGE_FIELD: &str = "message";
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Extra key/value data attached to a notification.
pub type Extra = Map<String, Value>;

/// Delivery is best effort: failures are logged and never returned.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn info(&self, header: &str, body: &str, extra: Option<&Extra>);

    async fn error(
        &self,
        header: &str,
        body: &str,
        err: &(dyn std::error::Error + Send + Sync),
        extra: Option<&Extra>,
    );
}

/// Drops every notification.
#[derive(Debug, Default)]
pub struct Disabled;

#[async_trait]
impl Notifier for Disabled {
    async fn info(&self, _header: &str, _body: &str, _extra: Option<&Extra>) {}

    async fn error(
        &self,
        _header: &str,
        _body: &str,
        _err: &(dyn std::error::Error + Send + Sync),
        _extra: Option<&Extra>,
    ) {
    }
}

/// Posts HTML messages as a form field to a URL.
#[derive(Debug)]
pub struct Webhook {
    url: String,
    message_field: String,
    client: reqwest::Client,
}

impl Webhook {
    pub fn new(url: impl Into<String>, message_field: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            message_field: message_field
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_MESSAGE_FIELD.to_string()),
            client,
        })
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .form(&[(self.message_field.as_str(), message)])
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            anyhow::bail!("unexpected status code from webhook: {}", response.status());
        }
        Ok(())
    }

    async fn deliver(&self, message: String) {
        if let Err(err) = self.send(&message).await {
            tracing::warn!(message = %message, error = %err, "could not send message to webhook");
        }
    }
}

#[async_trait]
impl Notifier for Webhook {
    async fn info(&self, header: &str, body: &str, extra: Option<&Extra>) {
        self.deliver(render_message(header, body, None, extra)).await;
    }

    async fn error(
        &self,
        header: &str,
        body: &str,
        err: &(dyn std::error::Error + Send + Sync),
        extra: Option<&Extra>,
    ) {
        self.deliver(render_message(header, body, Some(&err.to_string()), extra))
            .await;
    }
}

/// Builds the HTML notification text.
pub fn render_message(header: &str, body: &str, error: Option<&str>, extra: Option<&Extra>) -> String {
    let mut prefix = "🐙 <b>fleetback</b>".to_string();
    let mut body = body.to_string();

    if let Some(error) = error {
        prefix.push_str(" 🔥");
        if body.is_empty() {
            body = format!("Error:\n<pre>{}</pre>", escape_html(error));
        }
    }

    let mut lines = vec![prefix, String::new()];
    if !header.is_empty() {
        lines.push(format!("<b>{header}</b>"));
        lines.push(String::new());
    }
    lines.push(body);

    if let Some(extra) = extra.filter(|e| !e.is_empty()) {
        let json = serde_json::to_string_pretty(extra).unwrap_or_default();
        lines.push(String::new());
        lines.push(format!("<pre>{json}</pre>"));
    }

    lines.join("\n")
}
