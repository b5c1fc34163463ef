use uuid::Uuid;

use portal_db::DbPool;

use crate::error::Result;

/// Tracks the gateway's own metadata for a persistent conversation thread.
/// The thread's actual message history lives in the graph executor's
/// checkpoint store — this table only carries what the spawner needs to
/// hand back a stable `thread_id` and list a user's open threads.
pub struct ThreadManager {
    pool: DbPool,
}

impl ThreadManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates a new tracked thread and returns its id.
    pub async fn create(&self, user_id: Uuid, title: &str, provider: Option<&str>, model: Option<&str>) -> Result<Uuid> {
        let thread_id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO threads (thread_id, user_id, title, provider, model) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(title)
        .bind(provider)
        .bind(model)
        .execute(&self.pool)
        .await?;
        Ok(thread_id)
    }

    /// Increments the turn counter for a tracked thread. Best-effort
    /// bookkeeping — callers do not need to wait on it to proceed.
    pub async fn record_turn(&self, thread_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE threads SET turn_count = turn_count + 1, updated_at = now() WHERE thread_id = $1 AND user_id = $2",
        )
        .bind(thread_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
