use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub agent_name: String,
    pub skill: String,
    pub cron: String,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub config: Value,
}

/// Counts returned by [`crate::Scheduler::sync_from_heartbeats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}
