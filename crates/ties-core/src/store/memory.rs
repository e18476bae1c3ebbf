//! In-process storage backend.
//!
//! All edges live behind one [`RwLock`], so every graph mutation is a single
//! write-lock critical section and every read sees either the state before or
//! after it. Conversations live behind their own lock. `get_or_create` holds
//! the graph read lock while it checks edges and touches the map, so no block
//! or unfollow can land in between. Lock order is always graph, then
//! conversations.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;

use super::{ConversationRegistry, RelationshipGraph, UserDirectory, ensure_distinct, not_mutual};
use crate::error::{Result, TiesError};
use crate::model::conversation::Conversation;
use crate::model::edge::{BlockEdge, BlockOutcome, FollowEdge, PairEdges};
use crate::model::identity::{CanonicalPair, UserId};

#[derive(Debug, Default)]
struct GraphState {
    users: BTreeSet<UserId>,
    follows: BTreeSet<FollowEdge>,
    blocks: BTreeSet<BlockEdge>,
}

impl GraphState {
    fn follows(&self, a: &UserId, b: &UserId) -> bool {
        self.follows
            .contains(&FollowEdge::new(a.clone(), b.clone()))
    }

    fn blocks(&self, a: &UserId, b: &UserId) -> bool {
        self.blocks.contains(&BlockEdge::new(a.clone(), b.clone()))
    }
}

/// Storage backend holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: RwLock<GraphState>,
    conversations: Mutex<HashMap<CanonicalPair, Conversation>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store with `users` already registered.
    #[must_use]
    pub fn with_users<'a>(users: impl IntoIterator<Item = &'a UserId>) -> Self {
        let store = Self::new();
        store.write().users.extend(users.into_iter().cloned());
        store
    }

    // A panic while holding the lock cannot leave a half-applied mutation:
    // every critical section validates before it writes.
    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored follow edges.
    #[must_use]
    pub fn follow_count(&self) -> usize {
        self.read().follows.len()
    }

    /// Number of stored conversations.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RelationshipGraph for MemoryStore {
    fn follow(&self, a: &UserId, b: &UserId) -> Result<bool> {
        ensure_distinct(a, b)?;
        let mut state = self.write();
        if state.blocks(a, b) || state.blocks(b, a) {
            return Err(TiesError::Blocked {
                pair: CanonicalPair::new(a, b)?,
            });
        }
        Ok(state.follows.insert(FollowEdge::new(a.clone(), b.clone())))
    }

    fn unfollow(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self
            .write()
            .follows
            .remove(&FollowEdge::new(a.clone(), b.clone())))
    }

    fn block(&self, a: &UserId, b: &UserId) -> Result<BlockOutcome> {
        ensure_distinct(a, b)?;
        let mut state = self.write();
        let inserted = state.blocks.insert(BlockEdge::new(a.clone(), b.clone()));

        let mut severed = Vec::new();
        for edge in [
            FollowEdge::new(a.clone(), b.clone()),
            FollowEdge::new(b.clone(), a.clone()),
        ] {
            if state.follows.remove(&edge) {
                severed.push(edge);
            }
        }
        debug!(blocker = %a, blocked = %b, inserted, severed = severed.len(), "memory block");
        Ok(BlockOutcome { inserted, severed })
    }

    fn unblock(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self
            .write()
            .blocks
            .remove(&BlockEdge::new(a.clone(), b.clone())))
    }

    fn is_following(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self.read().follows(a, b))
    }

    fn is_blocked(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self.read().blocks(a, b))
    }

    fn edges(&self, a: &UserId, b: &UserId) -> Result<PairEdges> {
        let state = self.read();
        Ok(PairEdges {
            a_follows_b: state.follows(a, b),
            b_follows_a: state.follows(b, a),
            a_blocks_b: state.blocks(a, b),
            b_blocks_a: state.blocks(b, a),
        })
    }

    fn following(&self, user: &UserId) -> Result<Vec<UserId>> {
        Ok(self
            .read()
            .follows
            .iter()
            .filter(|edge| &edge.follower == user)
            .map(|edge| edge.followee.clone())
            .collect())
    }

    fn followers(&self, user: &UserId) -> Result<Vec<UserId>> {
        let mut followers: Vec<UserId> = self
            .read()
            .follows
            .iter()
            .filter(|edge| &edge.followee == user)
            .map(|edge| edge.follower.clone())
            .collect();
        followers.sort();
        Ok(followers)
    }

    fn blocked_by_user(&self, user: &UserId) -> Result<Vec<UserId>> {
        Ok(self
            .read()
            .blocks
            .iter()
            .filter(|edge| &edge.blocker == user)
            .map(|edge| edge.blocked.clone())
            .collect())
    }
}

impl ConversationRegistry for MemoryStore {
    fn find_existing(&self, a: &UserId, b: &UserId) -> Result<Option<Conversation>> {
        let pair = CanonicalPair::new(a, b)?;
        Ok(self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pair)
            .cloned())
    }

    fn get_or_create(&self, a: &UserId, b: &UserId) -> Result<(Conversation, bool)> {
        let pair = CanonicalPair::new(a, b)?;
        let graph = self.read();
        if graph.blocks(a, b) || graph.blocks(b, a) {
            return Err(TiesError::Blocked { pair });
        }

        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = conversations.get(&pair) {
            return Ok((existing.clone(), false));
        }
        if !(graph.follows(a, b) && graph.follows(b, a)) {
            return Err(not_mutual(a, b));
        }

        let conversation = Conversation::new(pair.clone(), Utc::now());
        conversations.insert(pair, conversation.clone());
        Ok((conversation, true))
    }

    fn conversations_for(&self, user: &UserId) -> Result<Vec<Conversation>> {
        let mut found: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|conversation| conversation.involves(user))
            .cloned()
            .collect();
        found.sort_by(|x, y| x.created_at.cmp(&y.created_at).then_with(|| x.id.cmp(&y.id)));
        Ok(found)
    }
}

impl UserDirectory for MemoryStore {
    fn register(&self, user: &UserId) -> Result<bool> {
        Ok(self.write().users.insert(user.clone()))
    }

    fn contains(&self, user: &UserId) -> Result<bool> {
        Ok(self.read().users.contains(user))
    }
}
