//! Conversations keyed by a canonical participant pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::identity::{CanonicalPair, UserId};

/// Prefix carried by every conversation identifier.
pub const CONVERSATION_ID_PREFIX: &str = "cv-";

/// Number of hex characters following the prefix.
const CONVERSATION_ID_HEX_LEN: usize = 12;

/// Stable identifier of a conversation (`cv-<12 hex>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Derive the identifier for a conversation created on `pair` at
    /// `created_at_us` microseconds.
    #[must_use]
    pub fn derive(pair: &CanonicalPair, created_at_us: i64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(pair.key().as_bytes());
        hasher.update(b"\t");
        hasher.update(&created_at_us.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!(
            "{CONVERSATION_ID_PREFIX}{}",
            &hex.as_str()[..CONVERSATION_ID_HEX_LEN]
        ))
    }

    /// Wrap an identifier read back from storage.
    #[must_use]
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single conversation record for an unordered pair of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: CanonicalPair,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a new record for `pair`, stamped at `created_at`.
    ///
    /// The timestamp is truncated to microseconds so that records survive a
    /// round trip through storage unchanged.
    #[must_use]
    pub fn new(pair: CanonicalPair, created_at: DateTime<Utc>) -> Self {
        let created_at_us = created_at.timestamp_micros();
        Self {
            id: ConversationId::derive(&pair, created_at_us),
            created_at: DateTime::from_timestamp_micros(created_at_us).unwrap_or(created_at),
            participants: pair,
        }
    }

    /// Creation time in microseconds since the Unix epoch.
    #[must_use]
    pub fn created_at_us(&self) -> i64 {
        self.created_at.timestamp_micros()
    }

    #[must_use]
    pub fn involves(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }
}
