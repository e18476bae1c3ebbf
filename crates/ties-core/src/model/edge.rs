//! Directed follow and block edges, and the per-pair view the policy reads.

use serde::{Deserialize, Serialize};

use super::identity::UserId;

/// `follower` follows `followee`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: UserId,
    pub followee: UserId,
}

impl FollowEdge {
    #[must_use]
    pub const fn new(follower: UserId, followee: UserId) -> Self {
        Self { follower, followee }
    }
}

/// `blocker` has barred `blocked` from interacting with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockEdge {
    pub blocker: UserId,
    pub blocked: UserId,
}

impl BlockEdge {
    #[must_use]
    pub const fn new(blocker: UserId, blocked: UserId) -> Self {
        Self { blocker, blocked }
    }
}

/// All four directed edges between an ordered pair `(a, b)`, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PairEdges {
    pub a_follows_b: bool,
    pub b_follows_a: bool,
    pub a_blocks_b: bool,
    pub b_blocks_a: bool,
}

impl PairEdges {
    /// A block exists in at least one direction.
    #[must_use]
    pub const fn any_block(self) -> bool {
        self.a_blocks_b || self.b_blocks_a
    }

    /// Both follow edges exist.
    #[must_use]
    pub const fn mutual_follow(self) -> bool {
        self.a_follows_b && self.b_follows_a
    }

    /// A follow edge coexists with a block edge; storage must never allow it.
    #[must_use]
    pub const fn is_torn(self) -> bool {
        self.any_block() && (self.a_follows_b || self.b_follows_a)
    }
}

/// Result of a `block` mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockOutcome {
    /// The block edge was newly inserted.
    pub inserted: bool,
    /// Follow edges removed in the same transaction.
    pub severed: Vec<FollowEdge>,
}
