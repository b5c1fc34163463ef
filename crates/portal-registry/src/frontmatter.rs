//! YAML-frontmatter extraction for the markdown blobs that make up an agent
//! definition (`tools_md`, `heartbeat_md`). Unparseable or absent content is
//! never an error here — callers treat it as "nothing declared".

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScheduleSpec {
    /// Appended to the agent name to form the derived `scheduler.agent_name`.
    pub name: String,
    pub cron: String,
    pub task: String,
    pub artifact_type: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TriggerSpec {
    pub event: String,
    pub skill: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct ToolsFrontmatter {
    #[serde(default)]
    allowed_servers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccessFrontmatter {
    #[serde(default)]
    access: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HeartbeatFrontmatter {
    #[serde(default)]
    schedules: Vec<ScheduleSpec>,
    #[serde(default)]
    triggers: Vec<TriggerSpec>,
}

/// Split a markdown blob into its leading `---`-delimited YAML block (if
/// any) and the remaining body.
fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let rest = raw.trim_start_matches('\n');
    let Some(after_open) = rest.strip_prefix("---") else {
        return (None, rest);
    };
    let Some(close) = after_open.find("\n---") else {
        return (None, rest);
    };
    let yaml = &after_open[..close];
    let body = after_open[close + 4..].trim_start_matches('\n');
    (Some(yaml), body)
}

/// Allowed tool server names declared in `tools_md`'s frontmatter. An empty
/// list, a missing field, or unparseable frontmatter all mean
/// *unrestricted* — callers treat that as "no filter".
pub fn allowed_servers(tools_md: &str) -> Vec<String> {
    let (Some(yaml), _) = split_frontmatter(tools_md) else {
        return Vec::new();
    };
    serde_yaml::from_str::<ToolsFrontmatter>(yaml)
        .map(|fm| fm.allowed_servers)
        .unwrap_or_default()
}

/// Schedules declared in `heartbeat_md`'s frontmatter.
pub fn schedules(heartbeat_md: &str) -> Vec<ScheduleSpec> {
    let (Some(yaml), _) = split_frontmatter(heartbeat_md) else {
        return Vec::new();
    };
    serde_yaml::from_str::<HeartbeatFrontmatter>(yaml)
        .map(|fm| fm.schedules)
        .unwrap_or_default()
}

/// Triggers declared in `heartbeat_md`'s frontmatter.
pub fn triggers(heartbeat_md: &str) -> Vec<TriggerSpec> {
    let (Some(yaml), _) = split_frontmatter(heartbeat_md) else {
        return Vec::new();
    };
    serde_yaml::from_str::<HeartbeatFrontmatter>(yaml)
        .map(|fm| fm.triggers)
        .unwrap_or_default()
}

/// Access tags declared in a system agent's `AGENT.md` frontmatter
/// (e.g. `cos_internal`, `admin_direct`). Absent or unparseable
/// frontmatter yields an empty list, which denies every caller.
pub fn access_tags(agent_md: &str) -> Vec<String> {
    let (Some(yaml), _) = split_frontmatter(agent_md) else {
        return Vec::new();
    };
    serde_yaml::from_str::<AccessFrontmatter>(yaml)
        .map(|fm| fm.access)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_servers_reads_list() {
        let md = "---\nallowed_servers: [github, slack]\n---\nbody";
        assert_eq!(allowed_servers(md), vec!["github".to_string(), "slack".to_string()]);
    }

    #[test]
    fn allowed_servers_missing_field_is_unrestricted() {
        assert_eq!(allowed_servers("---\nother: true\n---\n"), Vec::<String>::new());
    }

    #[test]
    fn allowed_servers_no_frontmatter_is_unrestricted() {
        assert_eq!(allowed_servers("just body text"), Vec::<String>::new());
    }

    #[test]
    fn allowed_servers_malformed_yaml_is_unrestricted() {
        assert_eq!(allowed_servers("---\n: : :\n---\n"), Vec::<String>::new());
    }

    #[test]
    fn schedules_parses_cron_entries() {
        let md = "---\nschedules:\n  - name: daily-report\n    cron: \"0 9 * * *\"\n    task: \"summarize inbox\"\n    artifact_type: report\n---\n";
        let parsed = schedules(md);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "daily-report");
        assert_eq!(parsed[0].cron, "0 9 * * *");
        assert_eq!(parsed[0].artifact_type, "report");
    }

    #[test]
    fn triggers_parses_event_entries() {
        let md = "---\ntriggers:\n  - event: pr_opened\n    skill: review\n---\n";
        let parsed = triggers(md);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].event, "pr_opened");
    }

    #[test]
    fn access_tags_reads_list() {
        let md = "---\naccess: [cos_internal, admin_direct]\n---\nbody";
        assert_eq!(access_tags(md), vec!["cos_internal".to_string(), "admin_direct".to_string()]);
    }

    #[test]
    fn access_tags_missing_is_empty() {
        assert!(access_tags("no frontmatter here").is_empty());
    }
}
