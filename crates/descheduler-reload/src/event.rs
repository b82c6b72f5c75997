use async_trait::async_trait;
use chrono::{DateTime, Utc};

use descheduler_config::{CredentialSource, DeprecationNotice};

#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// A new configuration passed validation and was published.
    Loaded {
        generation: u64,
        source: String,
        credential_source: CredentialSource,
        at: DateTime<Utc>,
    },
    /// The document used a deprecated field.
    Deprecated {
        source: String,
        notice: DeprecationNotice,
    },
    /// The document could not be loaded; the previous configuration stays active.
    Rejected {
        source: String,
        error: String,
        violations: Vec<String>,
        at: DateTime<Utc>,
    },
}

/// Sink for configuration events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: ConfigEvent);
}

/// Channel-based event sink that forwards events to a receiver.
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<ConfigEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ConfigEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: ConfigEvent) {
        let _ = self.tx.send(event);
    }
}

/// Logs every event through `tracing`. Rejections are logged only here.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: ConfigEvent) {
        match event {
            ConfigEvent::Loaded {
                generation,
                source,
                credential_source,
                ..
            } => {
                tracing::info!(
                    generation,
                    %source,
                    %credential_source,
                    "Configuration published"
                );
            }
            // Defaulting already warned about the field itself.
            ConfigEvent::Deprecated { source, notice } => {
                tracing::debug!(%source, field = notice.field, "Deprecated field resolved");
            }
            ConfigEvent::Rejected {
                source,
                error,
                violations,
                ..
            } => {
                tracing::error!(
                    %source,
                    violations = violations.len(),
                    error = %error,
                    "Configuration rejected"
                );
            }
        }
    }
}
