//! Notification queue: durable Postgres rows plus best-effort live fan-out
//! to registered channels. The row write always happens before fan-out is
//! attempted, so a channel failure never loses a notification — it is
//! still there for the next `get_unread`.

mod channel;
mod error;

pub use channel::{Channel, NotificationFrame};
pub use error::{NotifyError, Result};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tokio::sync::Mutex;
use uuid::Uuid;

use portal_db::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "urgent" => Some(Self::Urgent),
            "normal" => Some(Self::Normal),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub from_agent: String,
    pub to_thread_id: Option<Uuid>,
    pub message: String,
    pub priority: Priority,
    pub artifact_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

struct Registered {
    handle: Uuid,
    channel: Arc<dyn Channel>,
}

pub struct NotificationQueue {
    pool: DbPool,
    channels: Mutex<HashMap<Uuid, Vec<Registered>>>,
}

impl NotificationQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, channels: Mutex::new(HashMap::new()) }
    }

    /// Registers a live channel for `user_id`. Returns a handle to pass to
    /// [`unregister_session`](Self::unregister_session).
    pub async fn register_session(&self, user_id: Uuid, channel: Arc<dyn Channel>) -> Uuid {
        let handle = Uuid::now_v7();
        let mut channels = self.channels.lock().await;
        channels.entry(user_id).or_default().push(Registered { handle, channel });
        handle
    }

    pub async fn unregister_session(&self, user_id: Uuid, handle: Uuid) {
        let mut channels = self.channels.lock().await;
        if let Some(list) = channels.get_mut(&user_id) {
            list.retain(|r| r.handle != handle);
            if list.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Writes the notification row, then fans it out to whatever channels
    /// are currently registered for the user. The row is durable the
    /// moment this returns `Ok`; fan-out is best-effort and happens after.
    pub async fn post(
        &self,
        user_id: Uuid,
        from_agent: &str,
        message: &str,
        priority: Priority,
        to_thread_id: Option<Uuid>,
        artifact_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"INSERT INTO notifications (id, user_id, from_agent, to_thread_id, message, priority, artifact_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(from_agent)
        .bind(to_thread_id)
        .bind(message)
        .bind(priority.as_str())
        .bind(artifact_id)
        .execute(&self.pool)
        .await?;

        self.fan_out(user_id, NotificationFrame::new(id, from_agent, message, priority, artifact_id))
            .await;

        Ok(id)
    }

    /// Copies the channel list under the lock, then sends outside it — a
    /// slow or stuck channel send never blocks registration/unregistration
    /// on other tasks.
    async fn fan_out(&self, user_id: Uuid, frame: NotificationFrame) {
        let recipients: Vec<Arc<dyn Channel>> = {
            let channels = self.channels.lock().await;
            channels.get(&user_id).map(|list| list.iter().map(|r| r.channel.clone()).collect()).unwrap_or_default()
        };

        for channel in recipients {
            if let Err(e) = channel.send(&frame).await {
                tracing::warn!(user_id = %user_id, error = %e, "notification channel send failed");
            }
        }
    }

    pub async fn get_unread(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, from_agent, to_thread_id, message, priority, artifact_id, created_at, read_at
               FROM notifications
               WHERE user_id = $1 AND read_at IS NULL
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let priority: String = row.try_get("priority")?;
                Ok(Notification {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    from_agent: row.try_get("from_agent")?,
                    to_thread_id: row.try_get("to_thread_id")?,
                    message: row.try_get("message")?,
                    priority: Priority::parse(&priority).unwrap_or(Priority::Normal),
                    artifact_id: row.try_get("artifact_id")?,
                    created_at: row.try_get("created_at")?,
                    read_at: row.try_get("read_at")?,
                })
            })
            .collect()
    }

    /// Flips `read_at` for the given ids where it is currently null.
    /// Returns the number of rows actually updated.
    pub async fn mark_read(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("UPDATE notifications SET read_at = now() WHERE id = ANY($1) AND read_at IS NULL")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_round_trips_through_str() {
        for p in [Priority::Urgent, Priority::Normal, Priority::Low] {
            assert_eq!(Priority::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn priority_parse_rejects_unknown() {
        assert_eq!(Priority::parse("critical"), None);
    }

    struct RecordingChannel {
        sent: std::sync::Mutex<Vec<NotificationFrame>>,
    }

    #[async_trait::async_trait]
    impl Channel for RecordingChannel {
        async fn send(&self, frame: &NotificationFrame) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn register_then_unregister_drops_recipient() {
        let pool_channels: Mutex<HashMap<Uuid, Vec<Registered>>> = Mutex::new(HashMap::new());
        let user_id = Uuid::now_v7();
        let channel: Arc<dyn Channel> = Arc::new(RecordingChannel { sent: std::sync::Mutex::new(Vec::new()) });
        let handle = Uuid::now_v7();
        pool_channels.lock().await.entry(user_id).or_default().push(Registered { handle, channel });
        assert_eq!(pool_channels.lock().await.get(&user_id).unwrap().len(), 1);

        let mut channels = pool_channels.lock().await;
        if let Some(list) = channels.get_mut(&user_id) {
            list.retain(|r| r.handle != handle);
        }
        assert!(channels.get(&user_id).unwrap().is_empty());
    }
}
