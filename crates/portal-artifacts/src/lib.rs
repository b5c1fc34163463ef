//! Artifact store: durable textual outputs produced by agents. Plain
//! inserts, soft-deleted rows excluded from every read.

mod error;

pub use error::{ArtifactError, Result};

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use portal_db::DbPool;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub agent_id: String,
    pub artifact_type: String,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// A `list` row: everything about an artifact except its full body, which
/// is truncated to a short preview.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSummary {
    pub id: Uuid,
    pub agent_id: String,
    pub artifact_type: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

pub struct ArtifactStore {
    pool: DbPool,
}

impl ArtifactStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn write(
        &self,
        user_id: Uuid,
        agent_id: &str,
        artifact_type: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let metadata = metadata.unwrap_or(Value::Object(Default::default()));
        sqlx::query(
            r#"INSERT INTO artifacts (id, user_id, agent_id, type, content, metadata)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(agent_id)
        .bind(artifact_type)
        .bind(content)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get(&self, artifact_id: Uuid) -> Result<Option<Artifact>> {
        let row = sqlx::query(
            r#"SELECT id, user_id, agent_id, type, content, metadata, created_at
               FROM artifacts WHERE id = $1 AND NOT is_deleted"#,
        )
        .bind(artifact_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Artifact {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            agent_id: row.try_get("agent_id")?,
            artifact_type: row.try_get("type")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        }))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        artifact_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ArtifactSummary>> {
        let rows = match artifact_type {
            Some(t) => {
                sqlx::query(
                    r#"SELECT id, agent_id, type, content, created_at FROM artifacts
                       WHERE user_id = $1 AND type = $2 AND NOT is_deleted
                       ORDER BY created_at DESC LIMIT $3"#,
                )
                .bind(user_id)
                .bind(t)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT id, agent_id, type, content, created_at FROM artifacts
                       WHERE user_id = $1 AND NOT is_deleted
                       ORDER BY created_at DESC LIMIT $2"#,
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter()
            .map(|row| {
                let content: String = row.try_get("content")?;
                Ok(ArtifactSummary {
                    id: row.try_get("id")?,
                    agent_id: row.try_get("agent_id")?,
                    artifact_type: row.try_get("type")?,
                    preview: preview(&content),
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_content() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn preview_keeps_short_content_whole() {
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn preview_is_char_safe_not_byte_safe() {
        let multibyte = "🎉".repeat(300);
        let p = preview(&multibyte);
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
    }
}
