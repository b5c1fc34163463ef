// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "portal", about = "Multi-user assistant gateway")]
pub struct Cli {
    /// Path to an operator config file, layered over the usual search paths.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (default: info).
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run migrations, seed the agent registry, start the scheduler, and
    /// (if `bind_addr` is configured) listen for notification websocket
    /// connections. Blocks until interrupted.
    Serve,

    /// Agent registry operations.
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Credential vault operations.
    Vault {
        #[command(subcommand)]
        command: VaultCommands,
    },

    /// Scheduler operations.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Artifact store operations.
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },

    /// Run a single inline task against a user's agent and print the reply.
    /// Intended for operator smoke-testing, not as a conversational
    /// front-end.
    Task {
        user: Uuid,
        skill: String,
        task: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Scan the agent source directory and reconcile it with the stored
    /// templates.
    Sync,
    /// List the agents available to a user: existing instances plus
    /// templates not yet instantiated.
    List { user: Uuid },
    /// Resolve an agent definition for a user and print its system prompt.
    Resolve {
        agent_name: String,
        user: Uuid,
        /// `user`, `admin`, or `cos_internal`.
        #[arg(long, default_value = "user")]
        caller_profile: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum VaultCommands {
    Get { user: Uuid, service: String },
    Put {
        user: Uuid,
        service: String,
        /// Token payload as a JSON literal, e.g. '{"access_token":"..."}'.
        token_data: String,
    },
    Delete { user: Uuid, service: String },
    List { user: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    Add {
        user: Uuid,
        agent_name: String,
        skill: String,
        cron: String,
        /// Optional config payload as a JSON literal.
        config: Option<String>,
    },
    List { user: Uuid },
    Remove { id: Uuid },
    /// Reconcile the user's scheduler rows against declared heartbeat
    /// schedules across all their active agent instances.
    SyncHeartbeats { user: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum ArtifactCommands {
    List {
        user: Uuid,
        #[arg(long)]
        artifact_type: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    Get { id: Uuid },
}

pub fn parse_json_arg(raw: &str) -> anyhow::Result<Value> {
    Ok(serde_json::from_str(raw)?)
}
