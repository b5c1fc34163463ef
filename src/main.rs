// SPDX-License-Identifier: MIT
mod cli;
mod state;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{AgentCommands, ArtifactCommands, Cli, Commands, ScheduleCommands, VaultCommands};
use portal_artifacts::ArtifactStore;
use portal_bridge::BridgeManager;
use portal_llm::StubExecutorFactory;
use portal_notify::NotificationQueue;
use portal_registry::{CallerProfile, Registry};
use portal_scheduler::Scheduler;
use portal_spawner::{ModelSelection, Spawner, ThreadManager};
use portal_vault::CredentialVault;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = portal_config::load(cli.config.as_deref())?;
    let pool = portal_db::connect(&config.database_url)
        .await
        .context("connecting to the gateway database")?;
    portal_db::run_migrations(&pool).await.context("running migrations")?;

    let sync_report = portal_registry::sync(&pool, &config.agents_dir).await?;
    for (name, outcome) in &sync_report {
        tracing::debug!(agent = %name, outcome = outcome.as_str(), "agent template synced");
    }

    let vault = Arc::new(CredentialVault::new(pool.clone(), config.encryption.clone()));
    let bridges = Arc::new(BridgeManager::new(config.clone(), vault.clone()));
    let registry = Arc::new(Registry::new(pool.clone(), config.system_agents_dir.clone()));
    let artifacts = Arc::new(ArtifactStore::new(pool.clone()));
    let notifications = Arc::new(NotificationQueue::new(pool.clone()));
    let threads = ThreadManager::new(pool.clone());

    // Operators wire a real graph executor in; this stub keeps the gateway
    // runnable (and its own tests honest) without one configured.
    let executors: Arc<dyn portal_llm::GraphExecutorFactory> =
        Arc::new(StubExecutorFactory::new("no graph executor configured"));

    let spawner = Arc::new(Spawner::new(
        registry.clone(),
        bridges.clone(),
        artifacts.clone(),
        notifications.clone(),
        executors,
        threads,
    ));

    let scheduler = Arc::new(Scheduler::new(pool.clone(), Duration::from_secs(config.scheduler_poll_interval_secs)));
    {
        let spawner = spawner.clone();
        scheduler
            .set_callback(Arc::new(move |user_id, agent_name, skill, config: Value| {
                let spawner = spawner.clone();
                Box::pin(async move {
                    spawner.spawn_background(user_id, &agent_name, &skill, Some(config), ModelSelection::default());
                    Ok(())
                })
            }))
            .await;
    }

    let state = Arc::new(AppState {
        vault,
        bridges,
        registry,
        artifacts,
        notifications,
        spawner,
        scheduler: scheduler.clone(),
    });

    match cli.command {
        Commands::Serve => run_serve(config, state).await,
        Commands::Agent { command } => run_agent_command(command, &state, &config.agents_dir, &pool).await,
        Commands::Vault { command } => run_vault_command(command, &state).await,
        Commands::Schedule { command } => run_schedule_command(command, &state).await,
        Commands::Artifact { command } => run_artifact_command(command, &state).await,
        Commands::Task { user, skill, task } => {
            let reply = state.spawner.invoke_task(user, &skill, &task, None, ModelSelection::default()).await?;
            println!("{reply}");
            Ok(())
        }
    }
}

async fn run_serve(config: portal_config::OperatorConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    state.scheduler.start().await;

    let Some(bind_addr) = config.bind_addr else {
        tracing::info!("no bind_addr configured — running the scheduler only, with no notification listener");
        tokio::signal::ctrl_c().await?;
        state.scheduler.stop().await;
        return Ok(());
    };

    let app = axum::Router::new()
        .route("/ws/:user_id", axum::routing::get(ws::ws_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "notification websocket listener up");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    state.scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run_agent_command(
    command: AgentCommands,
    state: &AppState,
    agents_dir: &std::path::Path,
    pool: &portal_db::DbPool,
) -> anyhow::Result<()> {
    match command {
        AgentCommands::Sync => {
            let report = portal_registry::sync(pool, agents_dir).await?;
            for (name, outcome) in report {
                println!("{name}: {}", outcome.as_str());
            }
        }
        AgentCommands::List { user } => {
            for summary in state.registry.list_agents(user).await? {
                println!("{}", summary.name());
            }
        }
        AgentCommands::Resolve { agent_name, user, caller_profile } => {
            let caller = CallerProfile::parse(&caller_profile);
            let resolved = state.registry.resolve(&agent_name, user, caller).await?;
            println!("{}", resolved.system_prompt());
        }
    }
    Ok(())
}

async fn run_vault_command(command: VaultCommands, state: &AppState) -> anyhow::Result<()> {
    match command {
        VaultCommands::Get { user, service } => match state.vault.get(user, &service).await? {
            Some(credential) => println!("{}", credential.token_data),
            None => println!("(none)"),
        },
        VaultCommands::Put { user, service, token_data } => {
            let value = cli::parse_json_arg(&token_data)?;
            state.vault.put(user, &service, &value, None, None, None).await?;
        }
        VaultCommands::Delete { user, service } => {
            let removed = state.vault.delete(user, &service).await?;
            println!("{removed}");
        }
        VaultCommands::List { user } => {
            for service in state.vault.list_services(user).await? {
                println!("{service}");
            }
        }
    }
    Ok(())
}

async fn run_schedule_command(command: ScheduleCommands, state: &AppState) -> anyhow::Result<()> {
    match command {
        ScheduleCommands::Add { user, agent_name, skill, cron, config } => {
            let config = config.map(|c| cli::parse_json_arg(&c)).transpose()?;
            let id = state.scheduler.schedule(user, &agent_name, &skill, &cron, config).await?;
            println!("{id}");
        }
        ScheduleCommands::List { user } => {
            for entry in state.scheduler.list_schedules(user).await? {
                println!("{} {} {} next_run={}", entry.id, entry.agent_name, entry.cron, entry.next_run);
            }
        }
        ScheduleCommands::Remove { id } => {
            println!("{}", state.scheduler.unschedule(id).await?);
        }
        ScheduleCommands::SyncHeartbeats { user } => {
            let counts = state.scheduler.sync_from_heartbeats(&state.registry, user).await?;
            println!("created={} updated={} unchanged={}", counts.created, counts.updated, counts.unchanged);
        }
    }
    Ok(())
}

async fn run_artifact_command(command: ArtifactCommands, state: &AppState) -> anyhow::Result<()> {
    match command {
        ArtifactCommands::List { user, artifact_type, limit } => {
            for summary in state.artifacts.list(user, artifact_type.as_deref(), limit).await? {
                println!("{} [{}] {}", summary.id, summary.artifact_type, summary.preview);
            }
        }
        ArtifactCommands::Get { id } => match state.artifacts.get(id).await? {
            Some(artifact) => println!("{}", artifact.content),
            None => println!("(not found)"),
        },
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
