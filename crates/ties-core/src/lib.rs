//! ties-core: follow/block graph, conversation registry, and the permission
//! engine that decides who may message whom.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`Result`] with [`TiesError`];
//!   configuration and database helpers return `anyhow::Result`.
//! - **Logging**: `tracing` macros (`info!` for applied mutations, `warn!` for
//!   event delivery failures, `error!` for invariant violations).
//! - **Storage**: injected as trait objects; see [`store`].

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod lock;
pub mod model;
pub mod policy;
pub mod service;
pub mod store;

pub use error::{ErrorCode, Result, TiesError};
pub use event::{EventKind, EventNotifier, EventSink, RelationshipEvent};
pub use model::conversation::{Conversation, ConversationId};
pub use model::edge::{BlockEdge, BlockOutcome, FollowEdge, PairEdges};
pub use model::identity::{CanonicalPair, UserId};
pub use model::permission::{Permission, PermissionSet};
pub use policy::{PolicyEngine, ProfileVisibility, RelationshipSnapshot, VisibilityPolicy};
pub use service::{ConversationGrant, MutationOutcome, RelationshipService};
pub use store::{ConversationRegistry, RelationshipGraph, UserDirectory};
