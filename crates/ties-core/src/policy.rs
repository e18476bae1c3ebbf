//! Permission decisions between two users.
//!
//! # Overview
//!
//! [`PolicyEngine::decide`] is a pure function from a [`RelationshipSnapshot`]
//! to a [`PermissionSet`]. [`PolicyEngine::evaluate`] gathers the snapshot
//! from injected storage and then decides; it owns no state and caches
//! nothing, so a call made after a mutation always sees that mutation.
//!
//! # Rules
//!
//! Applied in precedence order, first match per permission wins:
//!
//! 1. A user has no relationship permissions toward themselves.
//! 2. A block in either direction removes messaging, follow, unfollow and
//!    full-profile permissions. `CanUnblock` is granted iff the actor is the
//!    blocker; otherwise `CanBlock`.
//! 3. An existing conversation grants `CanContinueExistingConversation`
//!    whatever the current follow state is.
//! 4. `CanSendNewMessage` requires mutual follow and no conversation yet.
//! 5. `CanFollow` iff the actor does not follow the target; `CanUnfollow` iff
//!    they do.
//! 6. `CanViewFullProfile` is delegated to a [`ProfileVisibility`]
//!    collaborator, after rule 2 has had its say.
//!
//! Mutual follow always means *actor follows target and target follows
//! actor*; it is never computed from the target's own lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::model::ParseEnumError;
use crate::model::conversation::Conversation;
use crate::model::edge::PairEdges;
use crate::model::identity::UserId;
use crate::model::permission::{Permission, PermissionSet};
use crate::store::{ConversationRegistry, RelationshipGraph};

/// Everything the policy needs to know about an `(actor, target)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipSnapshot {
    pub actor: UserId,
    pub target: UserId,
    /// Edges read with `a = actor`, `b = target`.
    pub edges: PairEdges,
    pub conversation: Option<Conversation>,
}

impl RelationshipSnapshot {
    #[must_use]
    pub const fn actor_follows_target(&self) -> bool {
        self.edges.a_follows_b
    }

    #[must_use]
    pub const fn target_follows_actor(&self) -> bool {
        self.edges.b_follows_a
    }

    #[must_use]
    pub const fn actor_blocks_target(&self) -> bool {
        self.edges.a_blocks_b
    }

    #[must_use]
    pub const fn target_blocks_actor(&self) -> bool {
        self.edges.b_blocks_a
    }

    #[must_use]
    pub const fn any_block(&self) -> bool {
        self.edges.any_block()
    }

    #[must_use]
    pub const fn mutual_follow(&self) -> bool {
        self.edges.mutual_follow()
    }

    #[must_use]
    pub const fn has_conversation(&self) -> bool {
        self.conversation.is_some()
    }

    #[must_use]
    pub fn is_self(&self) -> bool {
        self.actor == self.target
    }
}

/// Decides whether a viewer may see an owner's full profile.
///
/// Implementations live with profile configuration; the engine only overrides
/// them when a block exists.
pub trait ProfileVisibility: Send + Sync {
    fn permits(&self, snapshot: &RelationshipSnapshot) -> bool;
}

/// Built-in visibility settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityPolicy {
    /// Anyone may view.
    #[default]
    Public,
    /// The viewer must follow the owner.
    Followers,
    /// Viewer and owner must follow each other.
    Mutuals,
    /// Nobody else may view.
    Private,
}

impl VisibilityPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Followers => "followers",
            Self::Mutuals => "mutuals",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for VisibilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibilityPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "followers" => Ok(Self::Followers),
            "mutuals" => Ok(Self::Mutuals),
            "private" => Ok(Self::Private),
            _ => Err(ParseEnumError {
                expected: "visibility",
                got: s.to_string(),
            }),
        }
    }
}

impl ProfileVisibility for VisibilityPolicy {
    fn permits(&self, snapshot: &RelationshipSnapshot) -> bool {
        match self {
            Self::Public => true,
            Self::Followers => snapshot.actor_follows_target(),
            Self::Mutuals => snapshot.mutual_follow(),
            Self::Private => false,
        }
    }
}

/// Stateless permission evaluator over injected storage.
#[derive(Clone)]
pub struct PolicyEngine {
    graph: Arc<dyn RelationshipGraph>,
    registry: Arc<dyn ConversationRegistry>,
    visibility: Arc<dyn ProfileVisibility>,
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine").finish_non_exhaustive()
    }
}

impl PolicyEngine {
    #[must_use]
    pub fn new(
        graph: Arc<dyn RelationshipGraph>,
        registry: Arc<dyn ConversationRegistry>,
        visibility: Arc<dyn ProfileVisibility>,
    ) -> Self {
        Self {
            graph,
            registry,
            visibility,
        }
    }

    /// Read the current relationship state between `actor` and `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::StorageUnavailable`](crate::TiesError::StorageUnavailable)
    /// if storage cannot be read.
    pub fn snapshot(&self, actor: &UserId, target: &UserId) -> Result<RelationshipSnapshot> {
        if actor == target {
            return Ok(RelationshipSnapshot {
                actor: actor.clone(),
                target: target.clone(),
                edges: PairEdges::default(),
                conversation: None,
            });
        }

        let edges = self.graph.edges(actor, target)?;
        let conversation = self.registry.find_existing(actor, target)?;
        Ok(RelationshipSnapshot {
            actor: actor.clone(),
            target: target.clone(),
            edges,
            conversation,
        })
    }

    /// Current permissions of `actor` toward `target`.
    ///
    /// The decision itself is total; the only failure is being unable to
    /// read storage, which is reported rather than treated as a denial.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::StorageUnavailable`](crate::TiesError::StorageUnavailable)
    /// if storage cannot be read.
    pub fn evaluate(&self, actor: &UserId, target: &UserId) -> Result<PermissionSet> {
        let snapshot = self.snapshot(actor, target)?;
        let permissions = self.decide(&snapshot);
        debug!(%actor, %target, %permissions, "evaluated permissions");
        Ok(permissions)
    }

    /// Apply the rules to a snapshot, consulting this engine's visibility.
    #[must_use]
    pub fn decide(&self, snapshot: &RelationshipSnapshot) -> PermissionSet {
        decide(snapshot, self.visibility.as_ref())
    }
}

/// Apply the permission rules to `snapshot`.
#[must_use]
pub fn decide(snapshot: &RelationshipSnapshot, visibility: &dyn ProfileVisibility) -> PermissionSet {
    let mut set = PermissionSet::empty();

    if snapshot.is_self() {
        return set;
    }

    if snapshot.any_block() {
        if snapshot.actor_blocks_target() {
            set.insert(Permission::CanUnblock);
        } else {
            set.insert(Permission::CanBlock);
        }
        return set;
    }

    set.insert(Permission::CanBlock);

    if snapshot.has_conversation() {
        set.insert(Permission::CanContinueExistingConversation);
    } else if snapshot.mutual_follow() {
        set.insert(Permission::CanSendNewMessage);
    }

    if snapshot.actor_follows_target() {
        set.insert(Permission::CanUnfollow);
    } else {
        set.insert(Permission::CanFollow);
    }

    if visibility.permits(snapshot) {
        set.insert(Permission::CanViewFullProfile);
    }

    set
}
