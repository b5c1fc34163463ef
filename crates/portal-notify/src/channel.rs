use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::Priority;

/// Wire shape sent to a live channel. The core does not specify framing —
/// only that `send` is awaitable and may fail independently per channel.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: Uuid,
    pub from_agent: String,
    pub message: String,
    pub priority: Priority,
    pub artifact_id: Option<Uuid>,
}

impl NotificationFrame {
    pub fn new(id: Uuid, from_agent: &str, message: &str, priority: Priority, artifact_id: Option<Uuid>) -> Self {
        Self {
            kind: "notification",
            id,
            from_agent: from_agent.to_string(),
            message: message.to_string(),
            priority,
            artifact_id,
        }
    }
}

/// An opaque live sink for notifications — in practice, one end of a
/// websocket connection. A failed send only drops that channel's delivery
/// of one frame; it never fails the post that triggered it.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, frame: &NotificationFrame) -> anyhow::Result<()>;
}
