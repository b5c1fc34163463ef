use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use portal_db::DbPool;
use portal_registry::Registry;

use crate::cron_util::next_cron_firing;
use crate::error::{Result, SchedulerError};
use crate::model::{ScheduleEntry, SyncCounts};

/// Invoked once a schedule row's advancement has already been committed.
/// `(user_id, agent_name, skill, config)` matches the spawner's
/// background-run shape.
pub type OnDue =
    Arc<dyn Fn(Uuid, String, String, Value) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// Single long-lived polling loop over the `scheduler` table. Each due row
/// is advanced to its next firing before the callback runs, so a crash
/// between advancement and dispatch can never double-fire that row.
pub struct Scheduler {
    pool: DbPool,
    callback: Arc<Mutex<Option<OnDue>>>,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(pool: DbPool, poll_interval: Duration) -> Self {
        Self {
            pool,
            callback: Arc::new(Mutex::new(None)),
            poll_interval,
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    pub async fn set_callback(&self, callback: OnDue) {
        *self.callback.lock().await = Some(callback);
    }

    /// Starts the polling loop as a detached task. Idempotent only in the
    /// sense that calling it twice leaks the first loop — callers start it
    /// once at process startup.
    pub async fn start(self: &Arc<Self>) {
        let this = self.clone();
        let shutdown = self.shutdown.clone();
        let interval = self.poll_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if let Err(e) = this.tick().await {
                    tracing::warn!(error = %e, "scheduler tick failed");
                }
            }
        });
        *self.handle.lock().await = Some(handle);
    }

    /// Cancels the loop at its next sleep point or tick boundary and
    /// awaits it. Per-fire tasks already in flight are not awaited.
    pub async fn stop(&self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// One polling pass: reads every active row due now, and for each
    /// spawns an independent task that advances then dispatches it. Public
    /// so tests can drive a single tick deterministically instead of
    /// waiting on the sleep interval.
    pub async fn tick(&self) -> Result<()> {
        let rows = sqlx::query(
            "SELECT id, user_id, agent_name, skill, cron, config FROM scheduler WHERE is_active = true AND next_run <= now()",
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let pool = self.pool.clone();
            let callback = self.callback.clone();
            tokio::spawn(async move {
                if let Err(e) = fire_one(pool, callback, row).await {
                    tracing::warn!(error = %e, "scheduler fire task failed");
                }
            });
        }
        Ok(())
    }

    pub async fn schedule(
        &self,
        user_id: Uuid,
        agent_name: &str,
        skill: &str,
        cron_expr: &str,
        config: Option<Value>,
    ) -> Result<Uuid> {
        let next_run = next_cron_firing(cron_expr, Utc::now())?;
        let id = Uuid::now_v7();
        let config = config.unwrap_or(Value::Object(Default::default()));
        sqlx::query(
            "INSERT INTO scheduler (id, user_id, agent_name, skill, cron, next_run, config) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(user_id)
        .bind(agent_name)
        .bind(skill)
        .bind(cron_expr)
        .bind(next_run)
        .bind(config)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn unschedule(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE scheduler SET is_active = false, updated_at = now() WHERE id = $1 AND is_active = true")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_schedules(&self, user_id: Uuid) -> Result<Vec<ScheduleEntry>> {
        let rows = sqlx::query(
            "SELECT id, user_id, agent_name, skill, cron, next_run, last_run, is_active, config
             FROM scheduler WHERE user_id = $1 AND is_active = true ORDER BY next_run",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entry_from_row).collect()
    }

    /// Walks the user's active agent instances, pulls `schedules` out of
    /// each heartbeat declaration, and reconciles them against the
    /// scheduler table. Rows whose heartbeat declaration has since
    /// disappeared are left alone — authors must `unschedule` explicitly.
    pub async fn sync_from_heartbeats(&self, registry: &Registry, user_id: Uuid) -> Result<SyncCounts> {
        let declared = registry
            .get_all_schedules(user_id)
            .await
            .map_err(|e| SchedulerError::Registry(e.to_string()))?;

        let existing: HashMap<String, ScheduleEntry> =
            self.list_schedules(user_id).await?.into_iter().map(|e| (e.agent_name.clone(), e)).collect();

        let mut counts = SyncCounts::default();
        for (instance_agent_name, spec) in declared {
            let derived_agent_name = format!("{instance_agent_name}-{}", spec.name);
            let config = json!({ "task": spec.task, "artifact_type": spec.artifact_type });

            match existing.get(&derived_agent_name) {
                None => {
                    self.schedule(user_id, &derived_agent_name, &instance_agent_name, &spec.cron, Some(config)).await?;
                    counts.created += 1;
                }
                Some(row) if row.cron == spec.cron => {
                    counts.unchanged += 1;
                }
                Some(row) => {
                    let next_run = next_cron_firing(&spec.cron, Utc::now())?;
                    let merged = merge_config(row.config.clone(), config);
                    sqlx::query("UPDATE scheduler SET cron = $1, next_run = $2, config = $3, updated_at = now() WHERE id = $4")
                        .bind(&spec.cron)
                        .bind(next_run)
                        .bind(merged)
                        .bind(row.id)
                        .execute(&self.pool)
                        .await?;
                    counts.updated += 1;
                }
            }
        }
        Ok(counts)
    }
}

fn entry_from_row(row: PgRow) -> Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        agent_name: row.try_get("agent_name")?,
        skill: row.try_get("skill")?,
        cron: row.try_get("cron")?,
        next_run: row.try_get("next_run")?,
        last_run: row.try_get("last_run")?,
        is_active: row.try_get("is_active")?,
        config: row.try_get("config")?,
    })
}

/// Overlays `additions`'s keys onto `base` when both are JSON objects;
/// otherwise the additions replace the base outright.
fn merge_config(base: Value, additions: Value) -> Value {
    match (base, additions) {
        (Value::Object(mut base), Value::Object(additions)) => {
            for (k, v) in additions {
                base.insert(k, v);
            }
            Value::Object(base)
        }
        (_, additions) => additions,
    }
}

/// Advances the row to its next firing, then invokes the callback if one
/// is registered. The advancement is committed before the callback runs
/// regardless of whether the callback succeeds.
async fn fire_one(pool: DbPool, callback: Arc<Mutex<Option<OnDue>>>, row: PgRow) -> anyhow::Result<()> {
    let id: Uuid = row.try_get("id")?;
    let user_id: Uuid = row.try_get("user_id")?;
    let agent_name: String = row.try_get("agent_name")?;
    let skill: String = row.try_get("skill")?;
    let cron_expr: String = row.try_get("cron")?;
    let config: Value = row.try_get("config")?;

    let next_run = next_cron_firing(&cron_expr, Utc::now())?;
    sqlx::query("UPDATE scheduler SET last_run = now(), next_run = $1, updated_at = now() WHERE id = $2")
        .bind(next_run)
        .bind(id)
        .execute(&pool)
        .await?;

    let maybe_callback = callback.lock().await.clone();
    if let Some(cb) = maybe_callback {
        if let Err(e) = cb(user_id, agent_name, skill, config).await {
            tracing::warn!(schedule_id = %id, error = %e, "scheduled callback failed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_config_overlays_new_keys_onto_existing_object() {
        let base = json!({"task": "old", "note": "kept"});
        let additions = json!({"task": "new", "artifact_type": "report"});
        let merged = merge_config(base, additions);
        assert_eq!(merged["task"], "new");
        assert_eq!(merged["note"], "kept");
        assert_eq!(merged["artifact_type"], "report");
    }

    #[test]
    fn merge_config_replaces_non_object_base() {
        let merged = merge_config(Value::Null, json!({"task": "x"}));
        assert_eq!(merged, json!({"task": "x"}));
    }
}
