//! The mutation service: the only entry point that changes relationships.
//!
//! Every request follows the same shape:
//!
//! 1. reject self-targeting and unknown identities,
//! 2. take the per-pair lock for the canonical pair,
//! 3. re-read the pair and re-evaluate policy,
//! 4. apply the storage mutation (one transaction),
//! 5. verify post-conditions,
//! 6. release the lock and publish events.
//!
//! Repeating a request that is already satisfied returns
//! [`MutationOutcome::Unchanged`] and publishes nothing.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use crate::error::{Result, TiesError};
use crate::event::{EventKind, EventNotifier, RelationshipEvent};
use crate::lock::PairLocks;
use crate::model::conversation::Conversation;
use crate::model::identity::{CanonicalPair, UserId};
use crate::model::permission::{Permission, PermissionSet};
use crate::policy::{PolicyEngine, ProfileVisibility, RelationshipSnapshot};
use crate::store::{ConversationRegistry, RelationshipGraph, UserDirectory};

/// What a mutation request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "events", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// State changed; carries the events that were published.
    Applied(Vec<RelationshipEvent>),
    /// The request was already satisfied.
    Unchanged,
}

impl MutationOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub fn events(&self) -> &[RelationshipEvent] {
        match self {
            Self::Applied(events) => events,
            Self::Unchanged => &[],
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Result of [`RelationshipService::get_or_create_conversation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationGrant {
    pub conversation: Conversation,
    /// This call created the record.
    pub created: bool,
}

/// Serializes and validates relationship mutations over injected storage.
pub struct RelationshipService {
    graph: Arc<dyn RelationshipGraph>,
    registry: Arc<dyn ConversationRegistry>,
    users: Arc<dyn UserDirectory>,
    policy: PolicyEngine,
    notifier: EventNotifier,
    locks: PairLocks,
}

impl std::fmt::Debug for RelationshipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipService")
            .field("notifier", &self.notifier)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl RelationshipService {
    #[must_use]
    pub fn new(
        graph: Arc<dyn RelationshipGraph>,
        registry: Arc<dyn ConversationRegistry>,
        users: Arc<dyn UserDirectory>,
        visibility: Arc<dyn ProfileVisibility>,
        notifier: EventNotifier,
    ) -> Self {
        let policy = PolicyEngine::new(Arc::clone(&graph), Arc::clone(&registry), visibility);
        Self {
            graph,
            registry,
            users,
            policy,
            notifier,
            locks: PairLocks::new(),
        }
    }

    /// Build a service whose graph, registry, and directory are one store.
    #[must_use]
    pub fn with_store<S>(
        store: Arc<S>,
        visibility: Arc<dyn ProfileVisibility>,
        notifier: EventNotifier,
    ) -> Self
    where
        S: RelationshipGraph + ConversationRegistry + UserDirectory + 'static,
    {
        Self::new(
            store.clone(),
            store.clone(),
            store,
            visibility,
            notifier,
        )
    }

    #[must_use]
    pub const fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    #[must_use]
    pub const fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    /// Add `user` to the directory. Returns `true` if they were new.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::StorageUnavailable`] if storage fails.
    pub fn register_user(&self, user: &UserId) -> Result<bool> {
        let created = self.users.register(user)?;
        if created {
            tracing::info!(%user, "registered user");
        }
        Ok(created)
    }

    /// Current permissions of `actor` toward `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::StorageUnavailable`] if storage fails.
    pub fn evaluate(&self, actor: &UserId, target: &UserId) -> Result<PermissionSet> {
        self.policy.evaluate(actor, target)
    }

    /// Current relationship state between `actor` and `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TiesError::StorageUnavailable`] if storage fails.
    pub fn snapshot(&self, actor: &UserId, target: &UserId) -> Result<RelationshipSnapshot> {
        self.policy.snapshot(actor, target)
    }

    /// `actor` starts following `target`.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`] if `actor == target`
    /// - [`TiesError::NotFound`] if either user is unknown
    /// - [`TiesError::Blocked`] if a block exists in either direction
    /// - [`TiesError::StorageUnavailable`] if storage fails
    pub fn request_follow(&self, actor: &UserId, target: &UserId) -> Result<MutationOutcome> {
        let pair = self.prepare(actor, target)?;
        let events = self.locks.with_pair(&pair, || -> Result<Vec<RelationshipEvent>> {
            let snapshot = self.policy.snapshot(actor, target)?;
            if snapshot.any_block() {
                return Err(TiesError::Blocked { pair: pair.clone() });
            }
            if !self.policy.decide(&snapshot).contains(Permission::CanFollow) {
                return Ok(Vec::new());
            }

            let inserted = self.graph.follow(actor, target)?;
            Ok(inserted
                .then(|| event(EventKind::Followed, actor, target))
                .into_iter()
                .collect())
        })?;
        Ok(self.finish(events))
    }

    /// `actor` stops following `target`.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`] if `actor == target`
    /// - [`TiesError::NotFound`] if either user is unknown
    /// - [`TiesError::StorageUnavailable`] if storage fails
    pub fn request_unfollow(&self, actor: &UserId, target: &UserId) -> Result<MutationOutcome> {
        let pair = self.prepare(actor, target)?;
        let events = self.locks.with_pair(&pair, || -> Result<Vec<RelationshipEvent>> {
            let snapshot = self.policy.snapshot(actor, target)?;
            if !self.policy.decide(&snapshot).contains(Permission::CanUnfollow) {
                return Ok(Vec::new());
            }

            let removed = self.graph.unfollow(actor, target)?;
            Ok(removed
                .then(|| event(EventKind::Unfollowed, actor, target))
                .into_iter()
                .collect())
        })?;
        Ok(self.finish(events))
    }

    /// `actor` blocks `target`, severing follows in both directions.
    ///
    /// Publishes one `relationship.unfollowed` event per severed edge, then
    /// `relationship.blocked`.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`] if `actor == target`
    /// - [`TiesError::NotFound`] if either user is unknown
    /// - [`TiesError::InvariantViolation`] if a follow edge survives the block
    /// - [`TiesError::StorageUnavailable`] if storage fails
    pub fn request_block(&self, actor: &UserId, target: &UserId) -> Result<MutationOutcome> {
        let pair = self.prepare(actor, target)?;
        let events = self.locks.with_pair(&pair, || -> Result<Vec<RelationshipEvent>> {
            let snapshot = self.policy.snapshot(actor, target)?;
            if !self.policy.decide(&snapshot).contains(Permission::CanBlock) {
                return Ok(Vec::new());
            }

            let outcome = self.graph.block(actor, target)?;

            let after = self.graph.edges(actor, target)?;
            if after.is_torn() {
                tracing::error!(
                    %actor,
                    %target,
                    edges = ?after,
                    "follow edge observed alongside block edge after block"
                );
                return Err(TiesError::InvariantViolation {
                    pair: pair.clone(),
                    detail: "follow edge coexists with block edge",
                });
            }

            let mut events: Vec<_> = outcome
                .severed
                .into_iter()
                .map(|edge| event(EventKind::Unfollowed, &edge.follower, &edge.followee))
                .collect();
            if outcome.inserted {
                events.push(event(EventKind::Blocked, actor, target));
            }
            Ok(events)
        })?;
        Ok(self.finish(events))
    }

    /// `actor` lifts their block on `target`. Severed follows stay severed.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`] if `actor == target`
    /// - [`TiesError::NotFound`] if either user is unknown
    /// - [`TiesError::StorageUnavailable`] if storage fails
    pub fn request_unblock(&self, actor: &UserId, target: &UserId) -> Result<MutationOutcome> {
        let pair = self.prepare(actor, target)?;
        let events = self.locks.with_pair(&pair, || -> Result<Vec<RelationshipEvent>> {
            let snapshot = self.policy.snapshot(actor, target)?;
            if !self.policy.decide(&snapshot).contains(Permission::CanUnblock) {
                return Ok(Vec::new());
            }

            let removed = self.graph.unblock(actor, target)?;
            Ok(removed
                .then(|| event(EventKind::Unblocked, actor, target))
                .into_iter()
                .collect())
        })?;
        Ok(self.finish(events))
    }

    /// Return the conversation between `actor` and `target`, creating it when
    /// the pair may start one.
    ///
    /// An existing conversation is returned whenever no block exists, whatever
    /// the follow state. A new one requires mutual follow. The registry
    /// re-checks both inside its own transaction, so a block committed by
    /// another process after the policy check still wins.
    ///
    /// # Errors
    ///
    /// - [`TiesError::InvalidOperation`] if `actor == target`
    /// - [`TiesError::NotFound`] if either user is unknown
    /// - [`TiesError::Blocked`] if a block exists in either direction
    /// - [`TiesError::NotPermitted`] if a new conversation is needed and the
    ///   users do not follow each other
    /// - [`TiesError::StorageUnavailable`] if storage fails
    #[instrument(skip_all, fields(%actor, %target))]
    pub fn get_or_create_conversation(
        &self,
        actor: &UserId,
        target: &UserId,
    ) -> Result<ConversationGrant> {
        let pair = self.prepare(actor, target)?;
        let (grant, events) = self.locks.with_pair(&pair, || -> Result<_> {
            let snapshot = self.policy.snapshot(actor, target)?;
            if snapshot.any_block() {
                return Err(TiesError::Blocked { pair: pair.clone() });
            }

            let permissions = self.policy.decide(&snapshot);
            if !permissions.contains(Permission::CanContinueExistingConversation)
                && !permissions.contains(Permission::CanSendNewMessage)
            {
                return Err(TiesError::NotPermitted {
                    actor: actor.clone(),
                    target: target.clone(),
                    permission: Permission::CanSendNewMessage,
                });
            }

            let (conversation, created) = self.registry.get_or_create(actor, target)?;
            let events = if created {
                vec![
                    event(EventKind::ConversationCreated, actor, target)
                        .with_conversation(conversation.id.clone()),
                ]
            } else {
                Vec::new()
            };
            Ok((
                ConversationGrant {
                    conversation,
                    created,
                },
                events,
            ))
        })?;
        self.finish(events);
        Ok(grant)
    }

    /// Validate identities and build the lock key.
    fn prepare(&self, actor: &UserId, target: &UserId) -> Result<CanonicalPair> {
        let pair = CanonicalPair::new(actor, target)?;
        for user in [actor, target] {
            if !self.users.contains(user)? {
                return Err(TiesError::NotFound(user.clone()));
            }
        }
        Ok(pair)
    }

    /// Publish committed events; runs after the pair lock is released.
    fn finish(&self, events: Vec<RelationshipEvent>) -> MutationOutcome {
        if events.is_empty() {
            return MutationOutcome::Unchanged;
        }
        for applied in &events {
            tracing::info!(
                kind = %applied.kind,
                actor = %applied.actor,
                target = %applied.target,
                "relationship changed"
            );
        }
        self.notifier.publish(&events);
        MutationOutcome::Applied(events)
    }
}

fn event(kind: EventKind, actor: &UserId, target: &UserId) -> RelationshipEvent {
    RelationshipEvent::new(kind, actor.clone(), target.clone(), Utc::now())
}
