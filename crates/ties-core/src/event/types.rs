//! Event kinds published after relationship mutations commit.
//!
//! The string form uses a `<subject>.<past-tense verb>` dotted name that is
//! stable across releases; journals and subscribers match on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every kind of event the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A follow edge was created.
    Followed,
    /// A follow edge was removed, explicitly or by a block.
    Unfollowed,
    /// A block edge was created.
    Blocked,
    /// A block edge was removed.
    Unblocked,
    /// A conversation record was created for a pair.
    ConversationCreated,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind {
    pub raw: String,
}

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event kind '{}': expected one of relationship.followed, \
             relationship.unfollowed, relationship.blocked, relationship.unblocked, \
             conversation.created",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventKind {}

impl EventKind {
    pub const ALL: [Self; 5] = [
        Self::Followed,
        Self::Unfollowed,
        Self::Blocked,
        Self::Unblocked,
        Self::ConversationCreated,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Followed => "relationship.followed",
            Self::Unfollowed => "relationship.unfollowed",
            Self::Blocked => "relationship.blocked",
            Self::Unblocked => "relationship.unblocked",
            Self::ConversationCreated => "conversation.created",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind { raw: s.to_string() })
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable() {
        let expected = [
            (EventKind::Followed, "relationship.followed"),
            (EventKind::Unfollowed, "relationship.unfollowed"),
            (EventKind::Blocked, "relationship.blocked"),
            (EventKind::Unblocked, "relationship.unblocked"),
            (EventKind::ConversationCreated, "conversation.created"),
        ];

        for (kind, name) in expected {
            assert_eq!(kind.to_string(), name);
            assert_eq!(name.parse::<EventKind>(), Ok(kind));
        }
    }

    #[test]
    fn fromstr_rejects_bare_verb() {
        let err = "followed".parse::<EventKind>().unwrap_err();
        assert_eq!(err.raw, "followed");
        assert!(err.to_string().contains("expected one of"));
    }

    #[test]
    fn serde_uses_dotted_name() {
        let json = serde_json::to_string(&EventKind::ConversationCreated).unwrap();
        assert_eq!(json, "\"conversation.created\"");
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventKind::ConversationCreated);
    }
}
