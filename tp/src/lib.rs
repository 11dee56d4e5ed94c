//! tripplanner - conversational trip planning for Sri Lanka
//!
//! A user describes a trip in free text. The planner extracts structured
//! values, validates them, asks one follow-up question at a time until the
//! trip is complete, then runs a staged pipeline that produces location
//! recommendations, a daily plan, a packing list and a narrative summary.
//!
//! # Modules
//!
//! - [`orchestrator`] - per-turn entry point and persistence loop
//! - [`dialogue`] - slot-filling state machine and follow-up questions
//! - [`extract`] - LLM slot extraction with local traveler parsing
//! - [`validate`] - per-field validation, gazetteer, fuzzy matching
//! - [`temporal`] - date, duration and season reconciliation
//! - [`sequencer`] - location, activity, packing and summary stages
//! - [`intent`] - plan / chat / refine routing
//! - [`llm`], [`retrieval`], [`geocode`] - external collaborators
//! - [`state`] - versioned conversation storage
//! - [`config`], [`cli`], [`repl`] - configuration and the `tp` binary

pub mod cli;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod extract;
pub mod geocode;
pub mod intent;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod repl;
pub mod reply;
pub mod retrieval;
pub mod sanitize;
pub mod sequencer;
pub mod state;
pub mod temporal;
pub mod validate;

pub use config::{Config, LlmConfig};
pub use domain::{AggregatePlan, Field, Message, MessageKind, TripRequest, TripStatus};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use orchestrator::{Orchestrator, PlannerError, TurnOutcome};
pub use state::{Conversation, ConversationStore, MemoryStore, StateManager};
