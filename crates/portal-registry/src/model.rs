use uuid::Uuid;

use crate::frontmatter::{self, ScheduleSpec, TriggerSpec};

/// Where an agent's instance row came from, mirrored from the `source`
/// check constraint on `agent_instances`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceSource {
    FromTemplate,
    UserDefined,
    Imported,
}

impl InstanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromTemplate => "from_template",
            Self::UserDefined => "user_defined",
            Self::Imported => "imported",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "from_template" => Some(Self::FromTemplate),
            "user_defined" => Some(Self::UserDefined),
            "imported" => Some(Self::Imported),
            _ => None,
        }
    }
}

/// The sentinel user id used for definitions that belong to no one —
/// system agents read straight off disk.
pub const SYSTEM_SENTINEL: &str = "__system__";

/// A fully resolved agent definition. The three variants carry only the
/// fields that make sense for their lifecycle rather than one struct with
/// fields that are meaningless for some origins: an instance is mutable
/// and has a soul, a template is shared and read-only, a system agent has
/// neither a soul nor a schedule.
#[derive(Debug, Clone)]
pub enum ResolvedAgent {
    /// A per-user materialization of a template or a user-defined agent.
    /// Mutable, and the only variant with soul memory.
    FromInstance {
        agent_name: String,
        user_id: Uuid,
        agent_md: String,
        tools_md: String,
        bootstrap_md: String,
        heartbeat_md: String,
        soul_md: String,
        customized_files: Vec<String>,
        template_version: Option<i32>,
        upgrade_available: bool,
    },
    /// A shared, versioned definition the caller's user has not yet
    /// instantiated. Read-only; no soul, no per-user customization.
    FromTemplate {
        agent_name: String,
        agent_md: String,
        tools_md: String,
        bootstrap_md: String,
        heartbeat_md: String,
        version: i32,
    },
    /// A filesystem-only agent with no per-user state at all: no soul,
    /// no schedule, no instance row.
    FromSystem {
        agent_name: String,
        agent_md: String,
        tools_md: String,
        bootstrap_md: String,
    },
}

impl ResolvedAgent {
    pub fn agent_name(&self) -> &str {
        match self {
            Self::FromInstance { agent_name, .. } => agent_name,
            Self::FromTemplate { agent_name, .. } => agent_name,
            Self::FromSystem { agent_name, .. } => agent_name,
        }
    }

    pub fn agent_md(&self) -> &str {
        match self {
            Self::FromInstance { agent_md, .. } => agent_md,
            Self::FromTemplate { agent_md, .. } => agent_md,
            Self::FromSystem { agent_md, .. } => agent_md,
        }
    }

    pub fn tools_md(&self) -> &str {
        match self {
            Self::FromInstance { tools_md, .. } => tools_md,
            Self::FromTemplate { tools_md, .. } => tools_md,
            Self::FromSystem { tools_md, .. } => tools_md,
        }
    }

    pub fn bootstrap_md(&self) -> &str {
        match self {
            Self::FromInstance { bootstrap_md, .. } => bootstrap_md,
            Self::FromTemplate { bootstrap_md, .. } => bootstrap_md,
            Self::FromSystem { bootstrap_md, .. } => bootstrap_md,
        }
    }

    /// Consumes the resolved agent and returns its bootstrap text. System
    /// agents' bootstrap is already folded from `BOOTSTRAP.md` plus
    /// `docs/` at load time.
    pub fn into_bootstrap_md(self) -> String {
        match self {
            Self::FromInstance { bootstrap_md, .. } => bootstrap_md,
            Self::FromTemplate { bootstrap_md, .. } => bootstrap_md,
            Self::FromSystem { bootstrap_md, .. } => bootstrap_md,
        }
    }

    /// Heartbeat declarations, where they exist. Templates and system
    /// agents never self-schedule on their own — only a materialized
    /// instance does.
    fn heartbeat_md(&self) -> &str {
        match self {
            Self::FromInstance { heartbeat_md, .. } => heartbeat_md,
            Self::FromTemplate { heartbeat_md, .. } => heartbeat_md,
            Self::FromSystem { .. } => "",
        }
    }

    /// Allow-list of tool server names this agent is restricted to. An
    /// empty list means unrestricted.
    pub fn allowed_servers(&self) -> Vec<String> {
        frontmatter::allowed_servers(self.tools_md())
    }

    pub fn schedules(&self) -> Vec<ScheduleSpec> {
        frontmatter::schedules(self.heartbeat_md())
    }

    pub fn triggers(&self) -> Vec<TriggerSpec> {
        frontmatter::triggers(self.heartbeat_md())
    }

    /// The system prompt: `agent_md`, with accumulated soul notes appended
    /// under a fixed delimiter when there are any. Only instances carry a
    /// soul.
    pub fn system_prompt(&self) -> String {
        match self {
            Self::FromInstance { agent_md, soul_md, .. } if !soul_md.trim().is_empty() => {
                format!("{agent_md}\n\n---\nAccumulated notes:\n{soul_md}")
            }
            _ => self.agent_md().to_string(),
        }
    }
}

/// One row in a `list_agents` response.
#[derive(Debug, Clone)]
pub enum AgentSummary {
    /// An instance (template-derived or user-defined) the user already has.
    Instance {
        name: String,
        source: InstanceSource,
        upgrade_available: bool,
    },
    /// A template the user has never instantiated.
    AvailableTemplate { name: String },
}

impl AgentSummary {
    pub fn name(&self) -> &str {
        match self {
            Self::Instance { name, .. } => name,
            Self::AvailableTemplate { name } => name,
        }
    }
}
