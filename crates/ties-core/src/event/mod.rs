//! Relationship events and their delivery.
//!
//! Events describe mutations that have already committed. They are built by
//! the mutation service and handed to an [`EventNotifier`], which fans them
//! out to every registered [`EventSink`]. Delivery is best effort: a sink
//! failure is logged and never reaches the caller of the mutation.

pub mod journal;
pub mod sink;
pub mod types;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::conversation::ConversationId;
use crate::model::identity::UserId;

pub use journal::{JournalSink, read_journal};
pub use sink::{BroadcastSink, EventNotifier, EventSink, MemorySink, SinkError};
pub use types::{EventKind, UnknownEventKind};

/// A committed relationship change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEvent {
    pub kind: EventKind,
    /// The user whose request caused the change. For severed follows this is
    /// the follower whose edge was removed.
    pub actor: UserId,
    pub target: UserId,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationId>,
}

impl RelationshipEvent {
    #[must_use]
    pub const fn new(kind: EventKind, actor: UserId, target: UserId, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            actor,
            target,
            at,
            conversation: None,
        }
    }

    #[must_use]
    pub fn with_conversation(mut self, id: ConversationId) -> Self {
        self.conversation = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_omits_missing_conversation() {
        let event = RelationshipEvent::new(
            EventKind::Followed,
            UserId::parse("alice").unwrap(),
            UserId::parse("bob").unwrap(),
            DateTime::from_timestamp_micros(1_700_000_000_000_000).unwrap(),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"relationship.followed\""));
        assert!(!json.contains("conversation"));

        let back: RelationshipEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
