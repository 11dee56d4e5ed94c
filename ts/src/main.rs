//! tripstore - inspect a trip planner record store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use log::info;

use tripstore::{Store, Versioned, default_store_dir};

/// Inspect records kept by the trip planner
#[derive(Parser)]
#[command(name = "tripstore", about = "Inspect versioned trip planner records", version)]
struct Cli {
    /// Store directory (defaults to the planner's data directory)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List records in a collection
    List {
        /// Collection name
        #[arg(default_value = "conversations")]
        collection: String,
    },

    /// Print one record as JSON
    Get {
        collection: String,
        id: String,
    },

    /// Delete one record
    Delete {
        collection: String,
        id: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let dir = cli.store.unwrap_or_else(default_store_dir);
    info!("opening store at {}", dir.display());
    let mut store = Store::open(&dir).context(format!("Failed to open store at {}", dir.display()))?;

    match cli.command {
        Command::List { collection } => {
            let records = store.list(&collection)?;
            if records.is_empty() {
                println!("{}", "No records".dimmed());
            }
            for record in records {
                let when = chrono::DateTime::from_timestamp_millis(record.updated_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{}  v{}  {}", record.id.bright_cyan(), record.version, when.dimmed());
            }
        }
        Command::Get { collection, id } => {
            let record: Option<Versioned<serde_json::Value>> = store.get(&collection, &id)?;
            match record {
                Some(record) => {
                    println!("{} v{}", id.bright_cyan(), record.version);
                    println!("{}", serde_json::to_string_pretty(&record.value)?);
                }
                None => {
                    eprintln!("{} {}/{} not found", "error:".red(), collection, id);
                    std::process::exit(1);
                }
            }
        }
        Command::Delete { collection, id } => {
            if store.delete(&collection, &id)? {
                println!("{} {}/{}", "deleted".green(), collection, id);
            } else {
                println!("{} {}/{} did not exist", "skipped".yellow(), collection, id);
            }
        }
    }

    Ok(())
}
