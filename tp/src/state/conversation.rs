//! Conversation record persisted between turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialogue::DialogueState;
use crate::domain::{AggregatePlan, TripRequest};

/// Who said something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One line of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Everything remembered about one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub dialogue: DialogueState,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub latest_plan: Option<AggregatePlan>,
    /// Finished trips, oldest first
    #[serde(default)]
    pub archived: Vec<TripRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            dialogue: DialogueState::default(),
            turns: Vec::new(),
            latest_plan: None,
            archived: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        let now = Utc::now();
        self.turns.push(Turn {
            speaker,
            text: text.into(),
            at: now,
        });
        self.updated_at = now;
    }

    pub fn has_plan(&self) -> bool {
        self.latest_plan.is_some()
    }

    /// Archive the finished trip and start collecting a new one
    pub fn start_new_trip(&mut self) {
        if self.dialogue.is_complete() {
            self.archived.push(self.dialogue.trip.clone());
        }
        self.dialogue = DialogueState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TripStatus;

    #[test]
    fn test_start_new_trip_archives_complete_trip() {
        let mut conversation = Conversation::new("c1");
        conversation.dialogue.trip.destination = Some("Ella".to_string());
        conversation.dialogue.trip.status = TripStatus::Complete;
        conversation.start_new_trip();
        assert_eq!(conversation.archived.len(), 1);
        assert_eq!(conversation.dialogue, DialogueState::default());

        conversation.dialogue.trip.destination = Some("Kandy".to_string());
        conversation.start_new_trip();
        assert_eq!(conversation.archived.len(), 1);
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut conversation = Conversation::new("c2");
        conversation.push_turn(Speaker::User, "hi");
        let json = serde_json::to_string(&conversation).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conversation);
    }
}
