//! Relay CLI
//!
//! Usage:
//!   relay run workflows/digest.toml --task "Summarise this week's issues"
//!   relay show workflows/digest.toml
//!   relay models
//!   relay auth status

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_agent::auth::EnvTokenSource;
use relay_agent::llm::list_models;
use relay_agent::{AuthCache, RelayConfig, SystemClock};
use relay_orchestrator::{BuildEnv, WorkflowDefinition, WorkflowResult};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Run sequential and manager-supervised multi-agent workflows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_URL", global = true)]
    url: Option<String>,

    /// Model for agents that do not name one
    #[arg(short = 'm', long, env = "OLLAMA_MODEL", global = true)]
    model: Option<String>,

    /// Config file (default: nearest .relay.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file against a task
    Run {
        /// Workflow definition (TOML)
        file: PathBuf,

        /// Task description
        #[arg(long, short)]
        task: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a workflow file and print its summary
    Show {
        /// Workflow definition (TOML)
        file: PathBuf,
    },
    /// List models available on the Ollama server
    Models,
    /// Inspect the connector authorization cache
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show cached authorizations and their remaining validity
    Status,
    /// Drop every cached authorization
    Clear,
}

/// Initialize tracing with the given verbosity level
///
/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
fn init_tracing(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // RUST_LOG overrides the flag
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = match &cli.config {
        Some(path) => RelayConfig::load_from_path(path)?,
        None => RelayConfig::load()?,
    };
    if let Some(url) = cli.url {
        config.llm.url = url;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }

    match cli.command {
        Commands::Run { file, task, json } => run_workflow(config, &file, &task, json).await,
        Commands::Show { file } => {
            show_workflow(config, &file)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Models => {
            list_available_models(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Auth { command } => {
            run_auth_command(&config, command)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_auth_cache(config: &RelayConfig) -> Result<AuthCache> {
    let validity = config.auth.validity();
    match config.auth.cache_path() {
        Some(path) => AuthCache::load(&path, Arc::new(SystemClock), validity),
        None => Ok(AuthCache::with_clock(Arc::new(SystemClock), validity)),
    }
}

fn save_auth_cache(config: &RelayConfig, cache: &AuthCache) {
    let Some(path) = config.auth.cache_path() else {
        return;
    };
    if let Err(e) = cache.save(&path) {
        tracing::warn!(path = %path.display(), "failed to save auth cache: {e:#}");
    }
}

async fn run_workflow(config: RelayConfig, file: &Path, task: &str, json: bool) -> Result<ExitCode> {
    let definition = WorkflowDefinition::from_toml_file(file)?;
    let cache = Arc::new(load_auth_cache(&config)?);
    let env = BuildEnv::ollama(config).with_auth(cache.clone(), Arc::new(EnvTokenSource));
    let workflow = definition.build(&env)?;

    let result = workflow.run(task).await;
    save_auth_cache(env.config(), &cache);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_result(result: &WorkflowResult) {
    println!("Workflow: {} ({})", result.workflow(), result.mode());
    for step in result.steps() {
        let status = if step.error.is_some() { "failed" } else { "ok" };
        println!("  [{}] {} - {}", step.index + 1, step.agent, status);
    }
    println!();

    match (result.final_output(), result.error()) {
        (Some(output), _) => println!("{output}"),
        (None, Some(error)) => println!("Workflow failed: {error}"),
        (None, None) => {}
    }
}

fn show_workflow(config: RelayConfig, file: &Path) -> Result<()> {
    let definition = WorkflowDefinition::from_toml_file(file)?;
    let workflow = definition
        .build(&BuildEnv::ollama(config))
        .with_context(|| format!("workflow in {} is invalid", file.display()))?;
    let summary = workflow.summary();

    println!("Workflow: {}", summary.name);
    if let Some(description) = &summary.description {
        println!("Description: {description}");
    }
    println!("Mode: {}", summary.mode);
    if let Some(manager) = &summary.manager_name {
        println!("Manager: {manager}");
    }
    println!("Max iterations: {}", summary.max_iterations);
    println!("Agents ({}):", summary.agent_count);
    for name in &summary.agents {
        println!("  - {name}");
    }
    Ok(())
}

async fn list_available_models(config: &RelayConfig) -> Result<()> {
    let models = list_models(&config.llm.url)
        .await
        .with_context(|| format!("cannot list models from {}", config.llm.url))?;

    if models.is_empty() {
        println!("No models available at {}", config.llm.url);
        return Ok(());
    }
    for model in models {
        let marker = if model.name == config.llm.model { "*" } else { " " };
        println!("{marker} {}", model.name);
    }
    Ok(())
}

fn run_auth_command(config: &RelayConfig, command: AuthCommands) -> Result<()> {
    let cache = load_auth_cache(config)?;
    match command {
        AuthCommands::Status => {
            let status = cache.status();
            if status.is_empty() {
                println!("No cached authorizations");
            }
            for (key, entry) in status {
                match entry.expires_in {
                    Some(remaining) if entry.valid => {
                        println!("{key}: valid, expires in {}s", remaining.as_secs())
                    }
                    _ => println!("{key}: expired"),
                }
            }
        }
        AuthCommands::Clear => {
            let count = cache.len();
            cache.clear();
            save_auth_cache(config, &cache);
            println!("Cleared {count} cached authorization(s)");
        }
    }
    Ok(())
}
