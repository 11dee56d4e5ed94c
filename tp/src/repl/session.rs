//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::cli::render_message;
use crate::domain::{Field, TripStatus};
use crate::orchestrator::Orchestrator;
use crate::state::ConversationStore;

/// Interactive REPL session
pub struct ReplSession {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
}

/// What to do after a slash command
#[derive(Debug, PartialEq, Eq)]
enum SlashResult {
    Continue,
    Quit,
}

fn new_conversation_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

impl ReplSession {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn ConversationStore>, conversation: Option<String>) -> Self {
        Self {
            orchestrator,
            store,
            conversation_id: conversation.unwrap_or_else(new_conversation_id),
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_user_input(input).await?;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Sri Lanka Trip Planner".bright_cyan().bold());
        println!("Conversation: {}", self.conversation_id.dimmed());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
        println!("Where in Sri Lanka would you like to go?");
        println!();
    }

    async fn process_user_input(&mut self, input: &str) -> Result<()> {
        debug!(conversation_id = %self.conversation_id, "ReplSession::process_user_input: called");
        let outcome = self.orchestrator.process(&self.conversation_id, input).await?;
        println!();
        for message in &outcome.messages {
            println!("{}", render_message(message));
        }
        if outcome.plan.is_some() && outcome.status == TripStatus::Complete {
            println!();
            println!(
                "{}",
                "Ask me to make it shorter or change the tone, or start a new trip with /new.".dimmed()
            );
        }
        println!();
        Ok(())
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/new" | "/n" => {
                self.conversation_id = new_conversation_id();
                println!("{} {}", "Started conversation".dimmed(), self.conversation_id.dimmed());
                SlashResult::Continue
            }
            "/state" | "/s" => {
                self.print_state().await;
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Show what the planner knows so far", "/state".yellow());
        println!("  {:14} Start a new conversation", "/new".yellow());
        println!("  {:14} Exit the REPL", "/quit".yellow());
        println!();
    }

    async fn print_state(&self) {
        let conversation = match self.store.load(&self.conversation_id).await {
            Ok(Some(record)) => record.value,
            Ok(None) => {
                println!("{}", "Nothing collected yet.".dimmed());
                return;
            }
            Err(e) => {
                println!("{} {}", "!".yellow(), e);
                return;
            }
        };

        let dialogue = &conversation.dialogue;
        let trip = &dialogue.trip;
        let show = |field: Field, value: Option<String>| {
            let value = value.map(|v| v.normal()).unwrap_or_else(|| "-".dimmed());
            println!("  {:16} {}", field.label(), value);
        };
        println!();
        println!("{}", "Trip so far:".bright_cyan());
        show(Field::Destination, trip.destination.clone());
        show(Field::StartDate, trip.start_date.map(|d| d.to_string()));
        show(Field::EndDate, trip.end_date.map(|d| d.to_string()));
        show(Field::TravelerCount, trip.traveler_count.map(|n| n.to_string()));
        show(Field::TripType, trip.trip_type.clone());
        show(Field::Budget, trip.budget.clone());
        show(
            Field::Preferences,
            (!trip.preferences.is_empty()).then(|| trip.preferences.join(", ")),
        );
        if let Some(field) = dialogue.awaiting {
            println!("  {:16} {}", "waiting for", field.label().yellow());
        }
        if conversation.has_plan() {
            println!("  {:16} {}", "plan", "ready".green());
        }
        if !conversation.archived.is_empty() {
            println!("  {:16} {}", "earlier trips", conversation.archived.len());
        }
        println!();
    }
}
