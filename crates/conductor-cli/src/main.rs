mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use conductor_agents::{AgentFactory, AgentManager};
use conductor_bus::MessageBus;
use conductor_orchestrator::{ExecutionStatus, Orchestrator};
use conductor_planner::{
    build_plan, execution_waves, topological_order, PlanBuilder, PlannerSettings, ProviderConfig,
    ProviderKind,
};
use config::{ConductorConfig, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conductor", about = "Conductor — goal-driven task orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "conductor.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Plan with the built-in scripted provider, never calling a remote model
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a goal to completion and print the execution
    Run {
        goal: String,
        /// Give up (and cancel) after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Plan a goal without executing it
    Plan {
        goal: String,
        /// Ask the provider for a second, optimized revision
        #[arg(long)]
        optimize: bool,
    },
    /// Validate a plan document stored as JSON
    Validate {
        file: PathBuf,
        /// Goal recorded on the plan (defaults to the file stem)
        #[arg(long)]
        goal: Option<String>,
    },
    /// List the configured agent pool
    Agents,
}

fn init_tracing(logging: &LoggingConfig, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn planner(provider: &ProviderConfig) -> anyhow::Result<Arc<PlanBuilder>> {
    let reasoning = provider
        .build_provider()
        .context("Failed to configure reasoning provider")?;
    info!(provider = reasoning.name(), model = %provider.model, "Reasoning provider ready");
    Ok(Arc::new(
        PlanBuilder::new(reasoning).with_settings(PlannerSettings::from(provider)),
    ))
}

fn agent_pool(config: &ConductorConfig) -> anyhow::Result<Arc<AgentManager>> {
    let manager = AgentManager::new(Arc::new(MessageBus::new()), AgentFactory::with_builtins());
    for (kind, count) in config.agent_pool() {
        for _ in 0..count {
            manager
                .spawn(kind.clone(), "")
                .with_context(|| format!("Failed to spawn agent of kind '{kind}'"))?;
        }
    }
    info!(count = manager.len(), "Agent pool ready");
    Ok(Arc::new(manager))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ConductorConfig::load(&cli.config)?;
    init_tracing(&config.logging, cli.json);

    let mut provider = config.provider.clone();
    if cli.offline {
        provider.kind = ProviderKind::Scripted;
    }

    match cli.command {
        Commands::Run { goal, timeout_secs } => {
            let orchestrator = Orchestrator::new(planner(&provider)?, agent_pool(&config)?);
            let started = orchestrator.start_task(&goal)?;
            info!(execution_id = %started.id, "Waiting for execution");

            let waited = orchestrator
                .wait_for_terminal(&started.id, Duration::from_secs(timeout_secs))
                .await;
            let execution = match waited {
                Ok(execution) => execution,
                Err(e) => {
                    warn!(execution_id = %started.id, error = %e, "Cancelling execution");
                    if let Err(e) = orchestrator.cancel_task(&started.id) {
                        warn!(error = %e, "Cancel failed");
                    }
                    orchestrator.shutdown().await;
                    return Err(e.into());
                }
            };
            print_json(&execution)?;
            orchestrator.shutdown().await;

            if execution.status != ExecutionStatus::Completed {
                anyhow::bail!(
                    "execution {} {}: {}",
                    execution.id,
                    execution.status,
                    execution.error.as_deref().unwrap_or("no error recorded")
                );
            }
        }
        Commands::Plan { goal, optimize } => {
            let builder = planner(&provider)?;
            let mut plan = builder.generate_plan(&goal).await?;
            if optimize {
                plan = builder.optimize_plan(&plan).await?;
            }
            let waves = execution_waves(&plan)?;
            print_json(&serde_json::json!({ "plan": plan, "waves": waves }))?;
        }
        Commands::Validate { file, goal } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read plan file '{}'", file.display()))?;
            let goal = goal.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let plan = build_plan(&goal, &text)
                .with_context(|| format!("Plan '{}' is invalid", file.display()))?;
            print_json(&serde_json::json!({
                "valid": true,
                "tasks": plan.tasks.len(),
                "dependencies": plan.edge_count(),
                "strategy": plan.strategy,
                "order": topological_order(&plan)?,
                "waves": execution_waves(&plan)?,
            }))?;
        }
        Commands::Agents => {
            let agents = agent_pool(&config)?;
            let health = agents.health_check();
            print_json(&serde_json::json!({
                "agents": agents.list(),
                "health": health,
                "stats": agents.stats(),
                "kinds": agents.factory().kinds(),
            }))?;
            agents.terminate_all().await;
        }
    }

    Ok(())
}
