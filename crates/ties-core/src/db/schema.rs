//! Canonical `SQLite` schema for the relationship store.
//!
//! - `users` lists every identity the engine knows about
//! - `follows` and `blocks` hold directed edges, one row per ordered pair
//! - `conversations` holds at most one row per canonical pair, enforced by a
//!   `UNIQUE (user_low, user_high)` constraint
//! - `store_meta` tracks the schema version alongside `PRAGMA user_version`

/// Migration v1: identity, edge, and conversation tables plus metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY CHECK (length(user_id) BETWEEN 1 AND 64),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS follows (
    follower_id TEXT NOT NULL,
    followee_id TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (follower_id, followee_id),
    CHECK (follower_id <> followee_id)
);

CREATE TABLE IF NOT EXISTS blocks (
    blocker_id TEXT NOT NULL,
    blocked_id TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (blocker_id, blocked_id),
    CHECK (blocker_id <> blocked_id)
);

CREATE TABLE IF NOT EXISTS conversations (
    conversation_id TEXT PRIMARY KEY,
    user_low TEXT NOT NULL,
    user_high TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    UNIQUE (user_low, user_high),
    CHECK (user_low < user_high),
    CHECK (conversation_id LIKE 'cv-%')
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: reverse-lookup indexes for follower and participant listings.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_follows_followee
    ON follows(followee_id, follower_id);

CREATE INDEX IF NOT EXISTS idx_blocks_blocked
    ON blocks(blocked_id, blocker_id);

CREATE INDEX IF NOT EXISTS idx_conversations_high
    ON conversations(user_high, created_at_us);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by listing query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_follows_followee",
    "idx_blocks_blocked",
    "idx_conversations_high",
];
