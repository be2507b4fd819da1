//! Chat-gateway collaborator boundary.
//!
//! The engine never talks to a chat platform directly. Outbound sends go
//! through [`ChatGateway`]; the host wires in a platform adapter (webhooks,
//! bot API, whatever the deployment uses). Delivery is best-effort; the
//! engine does not retry or ack.

use async_trait::async_trait;

use crate::message::BotIdentity;

/// Outbound message sink.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send plain content to a channel under the connection's own identity.
    async fn send_to_channel(&self, channel_id: &str, content: &str) -> Result<(), anyhow::Error>;

    /// Send content rendered under a custom identity (name + avatar).
    async fn send_as_identity(
        &self,
        channel_id: &str,
        identity: &BotIdentity,
        content: &str,
    ) -> Result<(), anyhow::Error>;
}

/// In-memory gateway that records every send. Used by handler tests.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: parking_lot::Mutex<Vec<SentMessage>>,
}

/// One recorded outbound message.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: String,
    pub identity: Option<BotIdentity>,
    pub content: String,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_to_channel(&self, channel_id: &str, content: &str) -> Result<(), anyhow::Error> {
        self.sent.lock().push(SentMessage {
            channel_id: channel_id.to_string(),
            identity: None,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn send_as_identity(
        &self,
        channel_id: &str,
        identity: &BotIdentity,
        content: &str,
    ) -> Result<(), anyhow::Error> {
        self.sent.lock().push(SentMessage {
            channel_id: channel_id.to_string(),
            identity: Some(identity.clone()),
            content: content.to_string(),
        });
        Ok(())
    }
}
