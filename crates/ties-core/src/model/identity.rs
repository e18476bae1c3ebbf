//! User identities and the canonical unordered pair built from two of them.
//!
//! Identities are opaque to the engine: the only properties it relies on are
//! equality and a stable total order. The order is the byte order of the
//! identity text, which makes [`CanonicalPair`] deterministic across
//! processes and storage backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TiesError;

/// Maximum identity length in bytes.
pub const MAX_IDENTITY_LEN: usize = 64;

/// An authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap an identity string.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::InvalidIdentity`] if the text is empty, longer
    /// than [`MAX_IDENTITY_LEN`], or contains characters outside
    /// `[A-Za-z0-9_.-]`.
    pub fn parse(raw: &str) -> Result<Self, TiesError> {
        let reason = if raw.is_empty() {
            Some("identity is empty")
        } else if raw.len() > MAX_IDENTITY_LEN {
            Some("identity is longer than 64 bytes")
        } else if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
        {
            Some("identity contains characters outside [A-Za-z0-9_.-]")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TiesError::InvalidIdentity {
                raw: raw.to_string(),
                reason,
            }),
            None => Ok(Self(raw.to_string())),
        }
    }

    /// Borrow the identity text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = TiesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = TiesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An unordered pair of distinct identities in canonical (sorted) order.
///
/// `{a, b}` and `{b, a}` produce equal pairs, so the pair can key storage
/// rows and locks that must be unique per relationship.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalPair {
    low: UserId,
    high: UserId,
}

impl CanonicalPair {
    /// Build the canonical pair for two identities.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::InvalidOperation`] if `a == b`.
    pub fn new(a: &UserId, b: &UserId) -> Result<Self, TiesError> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Ok(Self {
                low: a.clone(),
                high: b.clone(),
            }),
            std::cmp::Ordering::Greater => Ok(Self {
                low: b.clone(),
                high: a.clone(),
            }),
            std::cmp::Ordering::Equal => Err(TiesError::InvalidOperation { user: a.clone() }),
        }
    }

    /// The lower identity.
    #[must_use]
    pub const fn low(&self) -> &UserId {
        &self.low
    }

    /// The higher identity.
    #[must_use]
    pub const fn high(&self) -> &UserId {
        &self.high
    }

    /// Whether `user` is one of the two participants.
    #[must_use]
    pub fn contains(&self, user: &UserId) -> bool {
        &self.low == user || &self.high == user
    }

    /// The participant that is not `user`, if `user` is part of the pair.
    #[must_use]
    pub fn other(&self, user: &UserId) -> Option<&UserId> {
        if &self.low == user {
            Some(&self.high)
        } else if &self.high == user {
            Some(&self.low)
        } else {
            None
        }
    }

    /// Stable text key (`low|high`). `|` never appears in an identity.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}|{}", self.low, self.high)
    }
}

impl fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}
