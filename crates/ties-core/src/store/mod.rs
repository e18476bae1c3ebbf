//! Storage abstractions for the follow/block graph, the conversation
//! registry, and the user directory.
//!
//! The engine never talks to a concrete backend: callers construct a store
//! and inject it as trait objects. Two backends ship with the crate:
//!
//! - [`memory::MemoryStore`]: in-process maps behind locks, for tests and
//!   embedding.
//! - [`sqlite::SqliteStore`]: durable `SQLite` storage; every mutation is a
//!   single `BEGIN IMMEDIATE` transaction.
//!
//! # Atomicity
//!
//! Each trait method is one atomic step. In particular [`RelationshipGraph::block`]
//! inserts the block edge and removes both follow edges together, so no
//! reader can observe a block coexisting with a follow edge on the same pair.

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::model::conversation::Conversation;
use crate::model::edge::{BlockOutcome, PairEdges};
use crate::model::identity::UserId;

/// Directed follow and block edges between users.
pub trait RelationshipGraph: Send + Sync {
    /// Insert `FollowEdge(a, b)`. Returns `true` if the edge was new.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`](crate::TiesError::InvalidOperation) if `a == b`
    /// - [`TiesError::Blocked`](crate::TiesError::Blocked) if a block exists
    ///   in either direction
    /// - [`TiesError::StorageUnavailable`](crate::TiesError::StorageUnavailable)
    fn follow(&self, a: &UserId, b: &UserId) -> Result<bool>;

    /// Remove `FollowEdge(a, b)`. Returns `true` if an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn unfollow(&self, a: &UserId, b: &UserId) -> Result<bool>;

    /// Insert `BlockEdge(a, b)` and sever both follow edges in one step.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`](crate::TiesError::InvalidOperation) if `a == b`
    /// - [`TiesError::StorageUnavailable`](crate::TiesError::StorageUnavailable)
    fn block(&self, a: &UserId, b: &UserId) -> Result<BlockOutcome>;

    /// Remove `BlockEdge(a, b)`. Severed follows are not restored.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn unblock(&self, a: &UserId, b: &UserId) -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn is_following(&self, a: &UserId, b: &UserId) -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn is_blocked(&self, a: &UserId, b: &UserId) -> Result<bool>;

    /// Read all four directed edges between `a` and `b` as one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn edges(&self, a: &UserId, b: &UserId) -> Result<PairEdges>;

    /// Users `user` follows, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn following(&self, user: &UserId) -> Result<Vec<UserId>>;

    /// Users following `user`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn followers(&self, user: &UserId) -> Result<Vec<UserId>>;

    /// Users `user` has blocked, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn blocked_by_user(&self, user: &UserId) -> Result<Vec<UserId>>;
}

/// At most one conversation per unordered pair of users.
pub trait ConversationRegistry: Send + Sync {
    /// Look up the conversation between `a` and `b`, in either order.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`](crate::TiesError::InvalidOperation) if `a == b`
    /// - [`TiesError::StorageUnavailable`](crate::TiesError::StorageUnavailable)
    fn find_existing(&self, a: &UserId, b: &UserId) -> Result<Option<Conversation>>;

    /// Return the pair's conversation, creating it if absent.
    ///
    /// The block and follow edges are checked in the same atomic step as the
    /// lookup and insert: no record is returned while a block exists, and a
    /// new one is only created for a mutually following pair. Racing callers
    /// all receive the same record; only one sees `created == true`.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`](crate::TiesError::InvalidOperation) if `a == b`
    /// - [`TiesError::Blocked`](crate::TiesError::Blocked) if a block exists
    ///   in either direction
    /// - [`TiesError::NotPermitted`](crate::TiesError::NotPermitted) if no
    ///   conversation exists and `a` and `b` do not follow each other
    /// - [`TiesError::StorageUnavailable`](crate::TiesError::StorageUnavailable)
    fn get_or_create(&self, a: &UserId, b: &UserId) -> Result<(Conversation, bool)>;

    /// Conversations `user` participates in, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn conversations_for(&self, user: &UserId) -> Result<Vec<Conversation>>;
}

/// Known user identities.
pub trait UserDirectory: Send + Sync {
    /// Register `user`. Returns `true` if the user was new.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn register(&self, user: &UserId) -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error only if storage fails.
    fn contains(&self, user: &UserId) -> Result<bool>;
}

/// Error for a new conversation between users who do not follow each other.
pub(crate) fn not_mutual(a: &UserId, b: &UserId) -> crate::TiesError {
    crate::TiesError::NotPermitted {
        actor: a.clone(),
        target: b.clone(),
        permission: crate::Permission::CanSendNewMessage,
    }
}

/// Reject self-targeted graph operations.
pub(crate) fn ensure_distinct(a: &UserId, b: &UserId) -> Result<()> {
    if a == b {
        return Err(crate::TiesError::InvalidOperation { user: a.clone() });
    }
    Ok(())
}
