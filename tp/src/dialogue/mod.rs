//! Dialogue State Machine
//!
//! Drives slot filling one turn at a time: extract, validate, merge, then
//! either ask the single most important missing question or hand off a
//! complete trip. The interactive path never gives up; the batch path stops
//! after a configurable number of failed answers to the same question.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

mod questions;

pub use questions::QuestionBook;

use crate::domain::{Field, Message, MessageKind, TripRequest, TripStatus};
use crate::extract::SlotExtractor;
use crate::temporal::find_duration;
use crate::validate::{FieldValidator, ValidationContext};

/// Slot-filling state persisted with a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueState {
    pub trip: TripRequest,
    /// Every field a question was asked for, in order
    pub asked: Vec<Field>,
    /// Field the last question asked for
    pub awaiting: Option<Field>,
    /// Consecutive batch answers spent on `awaiting`
    pub batch_attempts: u32,
}

impl DialogueState {
    pub fn is_complete(&self) -> bool {
        self.trip.status == TripStatus::Complete
    }

    /// A question is pending or a trip is partly collected
    pub fn in_progress(&self) -> bool {
        !self.is_complete() && (self.awaiting.is_some() || self.trip.has_any_field())
    }

    fn was_asked(&self, field: Field) -> bool {
        self.asked.contains(&field)
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub state: DialogueState,
    /// Every message produced, across all turns
    pub messages: Vec<Message>,
    pub turns: usize,
    pub complete: bool,
}

/// Dialogue State Machine
pub struct DialogueMachine {
    extractor: SlotExtractor,
    validator: FieldValidator,
    questions: QuestionBook,
}

impl DialogueMachine {
    pub fn new(extractor: SlotExtractor, validator: FieldValidator, questions: QuestionBook) -> Self {
        Self {
            extractor,
            validator,
            questions,
        }
    }

    /// Apply one user message to `state`
    pub async fn advance(&self, text: &str, state: &DialogueState, today: NaiveDate) -> (DialogueState, Vec<Message>) {
        debug!(%text, awaiting = ?state.awaiting, "DialogueMachine::advance: called");
        let extraction = self.extractor.extract(text, &state.trip, state.awaiting, today).await;
        let mut messages = extraction.messages;
        let mut candidates = extraction.candidates;

        // a bare answer to the pending question belongs to that field
        if let Some(field) = state.awaiting
            && candidates.get(field).is_none()
        {
            let re_tracked = messages.iter().any(|m| m.kind == MessageKind::ReTrack);
            let is_length = field == Field::EndDate
                && (candidates.trip_duration.is_some() || find_duration(text).is_some());
            if !re_tracked && !is_length && !text.trim().is_empty() {
                debug!(%field, "advance: applying reply to awaited field");
                candidates.fill(field, text);
            }
        }

        let ctx = ValidationContext {
            reference: today,
            end_asked: state.was_asked(Field::EndDate),
        };
        let (mut trip, validation_messages) = self.validator.validate(&candidates, &state.trip, text, ctx).await;
        messages.extend(validation_messages);

        let mut next = state.clone();
        let missing = trip.missing_fields();
        match missing.first().copied() {
            None => {
                info!(destination = ?trip.destination, "Trip details complete");
                trip.status = TripStatus::Complete;
                next.awaiting = None;
            }
            Some(field) => {
                trip.status = TripStatus::AwaitingInput;
                let already_asked = messages.iter().any(|m| m.is(MessageKind::Followup, field));
                if !already_asked {
                    let explained = messages
                        .iter()
                        .any(|m| m.field == Some(field) && m.kind != MessageKind::Advisory);
                    let mut question = self.questions.question(field, &trip);
                    if state.awaiting == Some(field) && !explained {
                        question = format!("Sorry, I didn't catch that. {}", question);
                    }
                    messages.push(Message::followup(field, question));
                }
                if !next.was_asked(field) {
                    next.asked.push(field);
                }
                next.awaiting = Some(field);
            }
        }

        trip.pending_messages = messages.clone();
        next.trip = trip;
        debug!(status = ?next.trip.status, awaiting = ?next.awaiting, "advance: done");
        (next, messages)
    }

    /// Ask the optional budget question once
    fn ask_budget(&self, state: &mut DialogueState) -> Message {
        state.asked.push(Field::Budget);
        state.awaiting = Some(Field::Budget);
        Message::followup(Field::Budget, self.questions.question(Field::Budget, &state.trip))
    }

    /// Non-interactive slot filling over a fixed list of answers
    ///
    /// Each answer goes to the question pending at that point. Giving the same
    /// question more than `max_attempts` unusable answers stops the run.
    pub async fn run_batch(
        &self,
        initial: &str,
        answers: &[String],
        max_attempts: u32,
        today: NaiveDate,
    ) -> BatchOutcome {
        debug!(%initial, answer_count = answers.len(), %max_attempts, "DialogueMachine::run_batch: called");
        let (mut state, mut messages) = self.advance(initial, &DialogueState::default(), today).await;
        let mut turns = 1;
        let mut answers = answers.iter();

        loop {
            if state.is_complete() {
                if state.trip.budget.is_none() && !state.was_asked(Field::Budget) && answers.len() > 0 {
                    messages.push(self.ask_budget(&mut state));
                } else {
                    break;
                }
            }

            let Some(answer) = answers.next() else {
                break;
            };
            let asked = state.awaiting;
            let (next, turn_messages) = self.advance(answer, &state, today).await;
            turns += 1;
            messages.extend(turn_messages);
            state = next;

            match state.awaiting {
                Some(field) if Some(field) == asked => {
                    state.batch_attempts += 1;
                    if state.batch_attempts >= max_attempts {
                        info!(%field, attempts = state.batch_attempts, "Batch stopped at retry ceiling");
                        messages.push(Message::warning(
                            field,
                            format!(
                                "I still couldn't use your answer for the {} after {} attempts, so I'm stopping here.",
                                field.label(),
                                state.batch_attempts
                            ),
                        ));
                        break;
                    }
                }
                _ => state.batch_attempts = 0,
            }
        }

        let complete = state.is_complete();
        BatchOutcome {
            state,
            messages,
            turns,
            complete,
        }
    }
}
