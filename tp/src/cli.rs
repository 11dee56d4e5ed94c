//! CLI command definitions and output helpers

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::domain::{Message, MessageKind};
use crate::orchestrator::TurnOutcome;

/// tp - conversational Sri Lanka trip planner
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Plan a trip within Sri Lanka through a short conversation",
    version,
    after_help = "Logs are written to: ~/.local/share/tripplanner/logs/tripplanner.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive planning session
    Chat {
        /// Continue an existing conversation instead of starting a new one
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Send one message to a conversation and print the reply
    Send {
        /// Conversation id (created on first use)
        conversation: String,

        /// Message text
        text: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Plan a trip non-interactively from a request and scripted answers
    Plan {
        /// Initial trip request
        text: String,

        /// Answer for the next follow-up question (repeatable, used in order)
        #[arg(short, long = "answer", value_name = "ANSWER")]
        answers: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print a stored conversation
    Show {
        /// Conversation id
        conversation: String,
    },
}

/// Output format for turn results
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// One message as a terminal line
pub fn render_message(message: &Message) -> String {
    match message.kind {
        MessageKind::Followup => message.text.bright_cyan().to_string(),
        MessageKind::Warning => format!("{} {}", "!".yellow().bold(), message.text.yellow()),
        MessageKind::Advisory => format!("{} {}", "i".blue(), message.text.dimmed()),
        MessageKind::ReTrack => format!("{} {}", "→".magenta(), message.text.magenta()),
        MessageKind::Reply => message.text.clone(),
    }
}

/// Print a turn result in the requested format
pub fn print_outcome(outcome: &TurnOutcome, format: &OutputFormat) -> eyre::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => {
            for message in &outcome.messages {
                println!("{}", render_message(message));
            }
            println!();
            println!("{} {}", "conversation:".dimmed(), outcome.conversation_id.dimmed());
        }
    }
    Ok(())
}
