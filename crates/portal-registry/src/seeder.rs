use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use portal_db::DbPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
    Error(String),
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Error(_) => "error",
        }
    }
}

struct RawTemplate {
    name: String,
    agent_md: String,
    tools_md: String,
    bootstrap_md: String,
    heartbeat_md: String,
}

fn read_optional(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

fn content_hash(raw: &RawTemplate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.agent_md.as_bytes());
    hasher.update(raw.tools_md.as_bytes());
    hasher.update(raw.bootstrap_md.as_bytes());
    hasher.update(raw.heartbeat_md.as_bytes());
    hex::encode(hasher.finalize())
}

/// Scan every subdirectory of `source_dir` as a candidate agent template.
/// Each subdirectory must have an `AGENT.md` (or legacy `SKILL.md`); missing
/// `TOOLS.md`/`BOOTSTRAP.md`/`HEARTBEAT.md` default to empty.
fn scan_templates(source_dir: &Path) -> Vec<RawTemplate> {
    let Ok(entries) = std::fs::read_dir(source_dir) else {
        return Vec::new();
    };
    let mut templates = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let agent_md_path = {
            let modern = path.join("AGENT.md");
            if modern.is_file() {
                modern
            } else {
                path.join("SKILL.md")
            }
        };
        if !agent_md_path.is_file() {
            continue;
        }

        templates.push(RawTemplate {
            name: name.to_string(),
            agent_md: read_optional(&agent_md_path),
            tools_md: read_optional(&path.join("TOOLS.md")),
            bootstrap_md: read_optional(&path.join("BOOTSTRAP.md")),
            heartbeat_md: read_optional(&path.join("HEARTBEAT.md")),
        });
    }
    templates
}

/// Synchronize on-disk agent templates into `agent_templates`. Existing
/// instances whose `agent_md` was never customized are flagged with
/// `upgrade_available = true` when their template's content changes.
pub async fn sync(pool: &DbPool, source_dir: &Path) -> Result<HashMap<String, SyncOutcome>> {
    let mut outcomes = HashMap::new();

    for raw in scan_templates(source_dir) {
        let name = raw.name.clone();
        let hash = content_hash(&raw);

        let outcome = sync_one(pool, &raw, &hash).await;
        outcomes.insert(name, outcome);
    }

    Ok(outcomes)
}

async fn sync_one(pool: &DbPool, raw: &RawTemplate, hash: &str) -> SyncOutcome {
    let existing = sqlx::query("SELECT id, content_hash, version FROM agent_templates WHERE name = $1")
        .bind(&raw.name)
        .fetch_optional(pool)
        .await;

    let existing = match existing {
        Ok(row) => row,
        Err(e) => return SyncOutcome::Error(e.to_string()),
    };

    match existing {
        None => {
            let inserted = sqlx::query(
                r#"INSERT INTO agent_templates (id, name, agent_md, tools_md, bootstrap_md, heartbeat_md, content_hash, version)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, 1)"#,
            )
            .bind(Uuid::now_v7())
            .bind(&raw.name)
            .bind(&raw.agent_md)
            .bind(&raw.tools_md)
            .bind(&raw.bootstrap_md)
            .bind(&raw.heartbeat_md)
            .bind(hash)
            .execute(pool)
            .await;

            match inserted {
                Ok(_) => SyncOutcome::Created,
                Err(e) => SyncOutcome::Error(e.to_string()),
            }
        }
        Some(row) => {
            let stored_hash: String = match row.try_get("content_hash") {
                Ok(h) => h,
                Err(e) => return SyncOutcome::Error(e.to_string()),
            };
            if stored_hash == hash {
                return SyncOutcome::Unchanged;
            }

            let current_version: i32 = row.try_get("version").unwrap_or(1);
            let updated = sqlx::query(
                r#"UPDATE agent_templates
                   SET agent_md = $1, tools_md = $2, bootstrap_md = $3, heartbeat_md = $4,
                       content_hash = $5, version = $6, updated_at = now()
                   WHERE name = $7"#,
            )
            .bind(&raw.agent_md)
            .bind(&raw.tools_md)
            .bind(&raw.bootstrap_md)
            .bind(&raw.heartbeat_md)
            .bind(hash)
            .bind(current_version + 1)
            .bind(&raw.name)
            .execute(pool)
            .await;

            if let Err(e) = updated {
                return SyncOutcome::Error(e.to_string());
            }

            let flagged = sqlx::query(
                r#"UPDATE agent_instances
                   SET upgrade_available = true
                   WHERE template_name = $1
                     AND NOT ('agent_md' = ANY(customized_files))"#,
            )
            .bind(&raw.name)
            .execute(pool)
            .await;

            if let Err(e) = flagged {
                tracing::warn!(template = %raw.name, error = %e, "failed to flag instances with upgrade_available");
            }

            SyncOutcome::Updated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(agent: &str) -> RawTemplate {
        RawTemplate {
            name: "x".into(),
            agent_md: agent.into(),
            tools_md: String::new(),
            bootstrap_md: String::new(),
            heartbeat_md: String::new(),
        }
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(&raw("a")), content_hash(&raw("a")));
    }

    #[test]
    fn content_hash_changes_with_content() {
        assert_ne!(content_hash(&raw("a")), content_hash(&raw("b")));
    }

    #[test]
    fn scan_templates_prefers_agent_md_over_skill_md() {
        let dir = tempfile::tempdir().unwrap();
        let template_dir = dir.path().join("reviewer");
        std::fs::create_dir(&template_dir).unwrap();
        std::fs::write(template_dir.join("AGENT.md"), "new").unwrap();
        std::fs::write(template_dir.join("SKILL.md"), "old").unwrap();

        let templates = scan_templates(dir.path());
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].agent_md, "new");
    }

    #[test]
    fn scan_templates_falls_back_to_skill_md() {
        let dir = tempfile::tempdir().unwrap();
        let template_dir = dir.path().join("legacy");
        std::fs::create_dir(&template_dir).unwrap();
        std::fs::write(template_dir.join("SKILL.md"), "legacy body").unwrap();

        let templates = scan_templates(dir.path());
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].agent_md, "legacy body");
    }

    #[test]
    fn scan_templates_skips_directories_without_agent_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        assert!(scan_templates(dir.path()).is_empty());
    }
}
