//! User-facing messages queued by each turn

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Field;

/// Kind of message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A question the user is expected to answer
    Followup,
    /// A rejected value; the field was cleared
    Warning,
    /// Something the planner inferred or corrected on the user's behalf
    Advisory,
    /// Out-of-scope input redirected back to the supported region
    ReTrack,
    /// A conversational answer
    Reply,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Followup => "followup",
            MessageKind::Warning => "warning",
            MessageKind::Advisory => "advisory",
            MessageKind::ReTrack => "re_track",
            MessageKind::Reply => "reply",
        };
        write!(f, "{}", s)
    }
}

/// A message for the user, optionally tied to one trip field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
    pub text: String,
}

impl Message {
    pub fn new(kind: MessageKind, field: Option<Field>, text: impl Into<String>) -> Self {
        Self {
            kind,
            field,
            text: text.into(),
        }
    }

    pub fn followup(field: Field, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Followup, Some(field), text)
    }

    pub fn warning(field: Field, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Warning, Some(field), text)
    }

    pub fn advisory(field: Option<Field>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Advisory, field, text)
    }

    pub fn re_track(field: Field, text: impl Into<String>) -> Self {
        Self::new(MessageKind::ReTrack, Some(field), text)
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Reply, None, text)
    }

    /// Whether this message is of `kind` and about `field`
    pub fn is(&self, kind: MessageKind, field: Field) -> bool {
        self.kind == kind && self.field == Some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_with_type_tag() {
        let msg = Message::re_track(Field::Destination, "Pick a place in Sri Lanka");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "re_track");
        assert_eq!(json["field"], "destination");

        let reply = serde_json::to_value(Message::reply("hi")).unwrap();
        assert!(reply.get("field").is_none());
    }

    #[test]
    fn test_is() {
        let msg = Message::warning(Field::StartDate, "past");
        assert!(msg.is(MessageKind::Warning, Field::StartDate));
        assert!(!msg.is(MessageKind::Warning, Field::EndDate));
        assert!(!msg.is(MessageKind::Advisory, Field::StartDate));
    }
}
