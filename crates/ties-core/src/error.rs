use std::fmt;

use crate::model::identity::{CanonicalPair, UserId};
use crate::model::permission::Permission;

/// Machine-readable error codes for client-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidIdentity,
    InvalidOperation,
    UserNotFound,
    Blocked,
    NotPermitted,
    InvariantViolation,
    StorageUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidIdentity => "E2001",
            Self::InvalidOperation => "E2002",
            Self::UserNotFound => "E2003",
            Self::Blocked => "E3001",
            Self::NotPermitted => "E3002",
            Self::InvariantViolation => "E4001",
            Self::StorageUnavailable => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidIdentity => "Invalid user identity",
            Self::InvalidOperation => "Invalid relationship operation",
            Self::UserNotFound => "User not found",
            Self::Blocked => "Blocked relationship",
            Self::NotPermitted => "Action not permitted",
            Self::InvariantViolation => "Relationship invariant violated",
            Self::StorageUnavailable => "Storage unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and clients.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tie init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .ties/config.toml and retry."),
            Self::InvalidIdentity => {
                Some("Use 1-64 characters from letters, digits, '_', '.', and '-'.")
            }
            Self::InvalidOperation => Some("Users cannot follow or block themselves."),
            Self::UserNotFound => Some("Register the user with `tie user add` first."),
            Self::Blocked => Some("Remove the block with `tie unblock` before retrying."),
            Self::NotPermitted => {
                Some("Starting a conversation requires both users to follow each other.")
            }
            Self::InvariantViolation => {
                Some("A follow edge coexists with a block edge. Report a bug with logs.")
            }
            Self::StorageUnavailable => Some("Retry the request once storage is reachable."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors produced by the relationship engine.
#[derive(Debug, thiserror::Error)]
pub enum TiesError {
    /// Self-referential follow/block/message attempt.
    #[error("invalid operation: {user} cannot target themselves")]
    InvalidOperation { user: UserId },

    /// Identity text failed validation.
    #[error("invalid identity '{raw}': {reason}")]
    InvalidIdentity { raw: String, reason: &'static str },

    /// A mutation referenced an identity the directory does not know.
    #[error("user not found: {0}")]
    NotFound(UserId),

    /// A block edge exists between the pair in at least one direction.
    #[error("blocked: {pair} has an active block")]
    Blocked { pair: CanonicalPair },

    /// Policy denied the requested action.
    #[error("{actor} lacks {permission} toward {target}")]
    NotPermitted {
        actor: UserId,
        target: UserId,
        permission: Permission,
    },

    /// Storage was observed in a state that must never exist.
    #[error("invariant violated for {pair}: {detail}")]
    InvariantViolation {
        pair: CanonicalPair,
        detail: &'static str,
    },

    /// The persistence layer failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),
}

impl TiesError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidOperation { .. } => ErrorCode::InvalidOperation,
            Self::InvalidIdentity { .. } => ErrorCode::InvalidIdentity,
            Self::NotFound(_) => ErrorCode::UserNotFound,
            Self::Blocked { .. } => ErrorCode::Blocked,
            Self::NotPermitted { .. } => ErrorCode::NotPermitted,
            Self::InvariantViolation { .. } => ErrorCode::InvariantViolation,
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
        }
    }

    /// Optional remediation hint for operators and clients.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether the caller's own retry policy may reasonably retry this request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = TiesError> = std::result::Result<T, E>;
