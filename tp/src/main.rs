//! tp - Sri Lanka trip planner
//!
//! CLI entry point for interactive and one-shot planning.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use tripplanner::cli::{Cli, Command, print_outcome};
use tripplanner::config::Config;
use tripplanner::llm::create_client;
use tripplanner::orchestrator::Orchestrator;
use tripplanner::prompts::PromptLoader;
use tripplanner::repl;
use tripplanner::state::{ConversationStore, StateManager};

fn setup_logging(level: &str) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // write to the log file, never to the terminal the conversation runs in
    let log_file = fs::File::create(log_dir.join("tripplanner.log")).context("Failed to create log file")?;
    let level: tracing::Level = level.parse().unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()))
        .unwrap_or_else(|| "info".to_string());
    setup_logging(&level).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "tripplanner loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let manager = StateManager::spawn(&config.storage.store_dir).context("Failed to open trip store")?;
    let store: Arc<dyn ConversationStore> = Arc::new(manager.clone());

    let result = match command {
        Command::Show { conversation } => cmd_show(store.as_ref(), &conversation).await,
        Command::Chat { conversation } => {
            let orchestrator = build_orchestrator(&config, store.clone())?;
            repl::run_interactive(Arc::new(orchestrator), store.clone(), conversation).await
        }
        Command::Send {
            conversation,
            text,
            format,
        } => {
            let orchestrator = build_orchestrator(&config, store.clone())?;
            let outcome = orchestrator.process(&conversation, &text).await?;
            print_outcome(&outcome, &format)
        }
        Command::Plan { text, answers, format } => {
            let orchestrator = build_orchestrator(&config, store.clone())?;
            let outcome = orchestrator.process_batch(&text, &answers).await?;
            print_outcome(&outcome, &format)
        }
    };

    if let Err(e) = manager.shutdown().await {
        warn!(error = %e, "State manager did not shut down cleanly");
    }
    result
}

/// Everything that talks to the model; fails fast on missing credentials
fn build_orchestrator(config: &Config, store: Arc<dyn ConversationStore>) -> Result<Orchestrator> {
    config.validate()?;
    let llm = create_client(&config.llm).map_err(|e| eyre::eyre!("Failed to create LLM client: {}", e))?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let prompts = Arc::new(PromptLoader::new(cwd));
    Orchestrator::from_config(config, llm, prompts, store)
}

/// Print a stored conversation
async fn cmd_show(store: &dyn ConversationStore, id: &str) -> Result<()> {
    let Some(record) = store.load(id).await? else {
        println!("No conversation named {}", id.yellow());
        return Ok(());
    };
    let conversation = record.value;

    println!("{} {} (version {})", "Conversation".bright_cyan(), conversation.id, record.version);
    println!();
    for turn in &conversation.turns {
        let speaker = match turn.speaker {
            tripplanner::state::Speaker::User => "you".bright_green(),
            tripplanner::state::Speaker::Assistant => "planner".bright_blue(),
        };
        println!("{} {}", format!("{}:", speaker).bold(), turn.text);
    }
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&conversation.dialogue.trip).context("Failed to serialize trip")?
    );
    if let Some(plan) = &conversation.latest_plan {
        let fallbacks: Vec<String> = plan
            .stages
            .iter()
            .filter(|r| r.is_fallback())
            .map(|r| r.stage.to_string())
            .collect();
        if !fallbacks.is_empty() {
            println!("{} {}", "Stages that fell back:".yellow(), fallbacks.join(", "));
        }
    }
    Ok(())
}

