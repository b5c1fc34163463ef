use std::collections::HashSet;
use std::path::PathBuf;

use sqlx::Row;
use uuid::Uuid;

use crate::error::{RegistryError, Result};
use crate::frontmatter::{self, ScheduleSpec, TriggerSpec};
use crate::model::{AgentSummary, InstanceSource, ResolvedAgent};
use crate::system::{self, CallerProfile};
use portal_db::DbPool;

const CUSTOMIZABLE_FIELDS: &[&str] = &["agent_md", "tools_md", "bootstrap_md", "heartbeat_md", "soul_md"];

pub struct Registry {
    pool: DbPool,
    system_agents_dir: PathBuf,
}

impl Registry {
    pub fn new(pool: DbPool, system_agents_dir: PathBuf) -> Self {
        Self { pool, system_agents_dir }
    }

    /// Three-tier resolution: active instance, then template (materializing
    /// a fresh instance on first use), then system agent on disk.
    pub async fn resolve(&self, agent_name: &str, user_id: Uuid, caller: CallerProfile) -> Result<ResolvedAgent> {
        if let Some(instance) = self.fetch_active_instance(user_id, agent_name).await? {
            return Ok(instance);
        }

        if self.fetch_template(agent_name).await?.is_some() {
            self.materialize_instance(user_id, agent_name).await?;
            if let Some(instance) = self.fetch_active_instance(user_id, agent_name).await? {
                return Ok(instance);
            }
        }

        system::load_system_agent(&self.system_agents_dir, agent_name, caller)
    }

    async fn fetch_active_instance(&self, user_id: Uuid, agent_name: &str) -> Result<Option<ResolvedAgent>> {
        let row = sqlx::query(
            r#"SELECT agent_md, tools_md, bootstrap_md, heartbeat_md, soul_md,
                      template_version, customized_files, upgrade_available
               FROM agent_instances
               WHERE user_id = $1 AND agent_name = $2 AND is_active = true"#,
        )
        .bind(user_id)
        .bind(agent_name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(ResolvedAgent::FromInstance {
            agent_name: agent_name.to_string(),
            user_id,
            agent_md: row.try_get("agent_md")?,
            tools_md: row.try_get("tools_md")?,
            bootstrap_md: row.try_get("bootstrap_md")?,
            heartbeat_md: row.try_get("heartbeat_md")?,
            soul_md: row.try_get("soul_md")?,
            customized_files: row.try_get("customized_files")?,
            template_version: row.try_get("template_version")?,
            upgrade_available: row.try_get("upgrade_available")?,
        }))
    }

    async fn fetch_template(&self, agent_name: &str) -> Result<Option<(Uuid, i32)>> {
        let row = sqlx::query("SELECT id, version FROM agent_templates WHERE name = $1")
            .bind(agent_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(r) => Some((r.try_get("id")?, r.try_get("version")?)),
            None => None,
        })
    }

    /// Insert a fresh instance from the named template. Uses `ON CONFLICT
    /// DO NOTHING` on `(user_id, agent_name)` so concurrent first-uses of
    /// the same agent by the same user race safely — whichever insert
    /// lands first wins, the other is a no-op.
    async fn materialize_instance(&self, user_id: Uuid, agent_name: &str) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO agent_instances
                   (id, user_id, agent_name, agent_md, tools_md, bootstrap_md, heartbeat_md,
                    template_name, source, template_version)
               SELECT $1, $2, t.name, t.agent_md, t.tools_md, t.bootstrap_md, t.heartbeat_md,
                      t.name, 'from_template', t.version
               FROM agent_templates t WHERE t.name = $3
               ON CONFLICT (user_id, agent_name) DO NOTHING"#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(agent_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Appends a dated entry to the user's instance soul. Never overwrites
    /// existing content.
    pub async fn append_soul(&self, user_id: Uuid, agent_name: &str, entry: &str) -> Result<()> {
        let line = format!("{}: {}\n", chrono::Utc::now().format("%Y-%m-%d"), entry);
        sqlx::query(
            "UPDATE agent_instances SET soul_md = soul_md || $1, updated_at = now() WHERE user_id = $2 AND agent_name = $3",
        )
        .bind(line)
        .bind(user_id)
        .bind(agent_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite one of the five customizable markdown fields and record
    /// the field name (de-duplicated) in `customized_files`.
    pub async fn update_file(&self, user_id: Uuid, agent_name: &str, field: &str, content: &str) -> Result<()> {
        if !CUSTOMIZABLE_FIELDS.contains(&field) {
            return Err(RegistryError::InvalidField(field.to_string()));
        }

        let sql = format!(
            r#"UPDATE agent_instances
               SET {field} = $1,
                   customized_files = CASE WHEN $2 = ANY(customized_files)
                                           THEN customized_files
                                           ELSE array_append(customized_files, $2) END,
                   updated_at = now()
               WHERE user_id = $3 AND agent_name = $4"#
        );
        sqlx::query(&sql)
            .bind(content)
            .bind(field)
            .bind(user_id)
            .bind(agent_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Create a brand-new user-defined instance with no backing template.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user_id: Uuid,
        agent_name: &str,
        agent_md: &str,
        tools_md: &str,
        bootstrap_md: &str,
        heartbeat_md: &str,
        created_by: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO agent_instances
                   (id, user_id, agent_name, agent_md, tools_md, bootstrap_md, heartbeat_md, source, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 'user_defined', $8)"#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(agent_name)
        .bind(agent_md)
        .bind(tools_md)
        .bind(bootstrap_md)
        .bind(heartbeat_md)
        .bind(created_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, user_id: Uuid, agent_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM agent_instances WHERE user_id = $1 AND agent_name = $2")
            .bind(user_id)
            .bind(agent_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Union of the user's existing instances and templates they have not
    /// yet instantiated.
    pub async fn list_agents(&self, user_id: Uuid) -> Result<Vec<AgentSummary>> {
        let instance_rows = sqlx::query(
            "SELECT agent_name, source, upgrade_available FROM agent_instances WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut seen = HashSet::new();
        let mut summaries = Vec::new();
        for row in instance_rows {
            let name: String = row.try_get("agent_name")?;
            let source: String = row.try_get("source")?;
            seen.insert(name.clone());
            summaries.push(AgentSummary::Instance {
                name,
                source: InstanceSource::parse(&source).unwrap_or(InstanceSource::UserDefined),
                upgrade_available: row.try_get("upgrade_available")?,
            });
        }

        let template_rows = sqlx::query("SELECT name FROM agent_templates").fetch_all(&self.pool).await?;
        for row in template_rows {
            let name: String = row.try_get("name")?;
            if !seen.contains(&name) {
                summaries.push(AgentSummary::AvailableTemplate { name });
            }
        }

        Ok(summaries)
    }

    /// Every `(agent_name, schedule)` pair across the user's active
    /// instances. System agents never appear here — they do not
    /// self-schedule.
    pub async fn get_all_schedules(&self, user_id: Uuid) -> Result<Vec<(String, ScheduleSpec)>> {
        let rows = self.active_heartbeats(user_id).await?;
        Ok(rows
            .into_iter()
            .flat_map(|(name, heartbeat_md)| {
                frontmatter::schedules(&heartbeat_md)
                    .into_iter()
                    .map(move |s| (name.clone(), s))
            })
            .collect())
    }

    pub async fn get_all_triggers(&self, user_id: Uuid) -> Result<Vec<(String, TriggerSpec)>> {
        let rows = self.active_heartbeats(user_id).await?;
        Ok(rows
            .into_iter()
            .flat_map(|(name, heartbeat_md)| {
                frontmatter::triggers(&heartbeat_md)
                    .into_iter()
                    .map(move |t| (name.clone(), t))
            })
            .collect())
    }

    async fn active_heartbeats(&self, user_id: Uuid) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query(
            "SELECT agent_name, heartbeat_md FROM agent_instances WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Ok((row.try_get::<String, _>("agent_name")?, row.try_get::<String, _>("heartbeat_md")?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::CUSTOMIZABLE_FIELDS;

    #[test]
    fn customizable_fields_match_the_five_named_columns() {
        assert_eq!(
            CUSTOMIZABLE_FIELDS,
            &["agent_md", "tools_md", "bootstrap_md", "heartbeat_md", "soul_md"]
        );
    }
}
