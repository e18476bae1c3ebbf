//! Durable storage backend on `SQLite`.
//!
//! Every mutation runs inside one `BEGIN IMMEDIATE` transaction, which takes
//! the database write lock up front. Mutations are therefore serialized
//! across threads *and* processes sharing the file, and a transaction that is
//! dropped before `commit` rolls back completely. Reads are single
//! statements, so under WAL they see a consistent committed snapshot.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, types::Type};
use tracing::debug;

use super::{ConversationRegistry, RelationshipGraph, UserDirectory, ensure_distinct, not_mutual};
use crate::db;
use crate::error::{Result, TiesError};
use crate::model::conversation::{Conversation, ConversationId};
use crate::model::edge::{BlockOutcome, FollowEdge, PairEdges};
use crate::model::identity::{CanonicalPair, UserId};

/// Storage backend over a single `SQLite` connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-migrated connection.
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (creating and migrating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, busy_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(db::open_store_db(path, busy_timeout)?))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(db::open_in_memory()?))
    }

    // A poisoned connection is still usable: any transaction open during
    // the panic was rolled back when it dropped.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

fn parse_user_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
    let raw: String = row.get(idx)?;
    UserId::parse(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let low = parse_user_column(row, 1)?;
    let high = parse_user_column(row, 2)?;
    let created_at_us: i64 = row.get(3)?;

    let participants = CanonicalPair::new(&low, &high)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error)))?;
    let created_at = DateTime::from_timestamp_micros(created_at_us).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(3, created_at_us)
    })?;

    Ok(Conversation {
        id: ConversationId::from_stored(id),
        participants,
        created_at,
    })
}

fn query_users(conn: &Connection, sql: &str, user: &UserId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let users = stmt
        .query_map([user.as_str()], |row| parse_user_column(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

// One statement, one snapshot.
fn read_edges(conn: &Connection, a: &UserId, b: &UserId) -> rusqlite::Result<PairEdges> {
    conn.query_row(
        "SELECT
            EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2),
            EXISTS(SELECT 1 FROM follows WHERE follower_id = ?2 AND followee_id = ?1),
            EXISTS(SELECT 1 FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2),
            EXISTS(SELECT 1 FROM blocks WHERE blocker_id = ?2 AND blocked_id = ?1)",
        params![a.as_str(), b.as_str()],
        |row| {
            Ok(PairEdges {
                a_follows_b: row.get(0)?,
                b_follows_a: row.get(1)?,
                a_blocks_b: row.get(2)?,
                b_blocks_a: row.get(3)?,
            })
        },
    )
}

const SELECT_CONVERSATION: &str = "SELECT conversation_id, user_low, user_high, created_at_us
     FROM conversations
     WHERE user_low = ?1 AND user_high = ?2";

impl RelationshipGraph for SqliteStore {
    fn follow(&self, a: &UserId, b: &UserId) -> Result<bool> {
        ensure_distinct(a, b)?;
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let blocked: bool = tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM blocks
                WHERE (blocker_id = ?1 AND blocked_id = ?2)
                   OR (blocker_id = ?2 AND blocked_id = ?1)
            )",
            params![a.as_str(), b.as_str()],
            |row| row.get(0),
        )?;
        if blocked {
            return Err(TiesError::Blocked {
                pair: CanonicalPair::new(a, b)?,
            });
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at_us)
             VALUES (?1, ?2, ?3)",
            params![a.as_str(), b.as_str(), now_us()],
        )? == 1;
        tx.commit()?;
        Ok(inserted)
    }

    fn unfollow(&self, a: &UserId, b: &UserId) -> Result<bool> {
        let removed = self.conn().execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![a.as_str(), b.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn block(&self, a: &UserId, b: &UserId) -> Result<BlockOutcome> {
        ensure_distinct(a, b)?;
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at_us)
             VALUES (?1, ?2, ?3)",
            params![a.as_str(), b.as_str(), now_us()],
        )? == 1;

        let mut severed = Vec::new();
        for (follower, followee) in [(a, b), (b, a)] {
            let removed = tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                params![follower.as_str(), followee.as_str()],
            )?;
            if removed > 0 {
                severed.push(FollowEdge::new(follower.clone(), followee.clone()));
            }
        }

        tx.commit()?;
        debug!(blocker = %a, blocked = %b, inserted, severed = severed.len(), "sqlite block");
        Ok(BlockOutcome { inserted, severed })
    }

    fn unblock(&self, a: &UserId, b: &UserId) -> Result<bool> {
        let removed = self.conn().execute(
            "DELETE FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2",
            params![a.as_str(), b.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn is_following(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
            params![a.as_str(), b.as_str()],
            |row| row.get(0),
        )?)
    }

    fn is_blocked(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2)",
            params![a.as_str(), b.as_str()],
            |row| row.get(0),
        )?)
    }

    fn edges(&self, a: &UserId, b: &UserId) -> Result<PairEdges> {
        Ok(read_edges(&self.conn(), a, b)?)
    }

    fn following(&self, user: &UserId) -> Result<Vec<UserId>> {
        query_users(
            &self.conn(),
            "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY followee_id",
            user,
        )
    }

    fn followers(&self, user: &UserId) -> Result<Vec<UserId>> {
        query_users(
            &self.conn(),
            "SELECT follower_id FROM follows WHERE followee_id = ?1 ORDER BY follower_id",
            user,
        )
    }

    fn blocked_by_user(&self, user: &UserId) -> Result<Vec<UserId>> {
        query_users(
            &self.conn(),
            "SELECT blocked_id FROM blocks WHERE blocker_id = ?1 ORDER BY blocked_id",
            user,
        )
    }
}

impl ConversationRegistry for SqliteStore {
    fn find_existing(&self, a: &UserId, b: &UserId) -> Result<Option<Conversation>> {
        let pair = CanonicalPair::new(a, b)?;
        Ok(self
            .conn()
            .query_row(
                SELECT_CONVERSATION,
                params![pair.low().as_str(), pair.high().as_str()],
                row_to_conversation,
            )
            .optional()?)
    }

    fn get_or_create(&self, a: &UserId, b: &UserId) -> Result<(Conversation, bool)> {
        let pair = CanonicalPair::new(a, b)?;
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The write lock is held from here to commit, so a block or unfollow
        // from another connection lands either before this read or after the
        // insert.
        let edges = read_edges(&tx, a, b)?;
        if edges.any_block() {
            return Err(TiesError::Blocked { pair });
        }

        let existing = tx
            .query_row(
                SELECT_CONVERSATION,
                params![pair.low().as_str(), pair.high().as_str()],
                row_to_conversation,
            )
            .optional()?;
        if let Some(stored) = existing {
            tx.commit()?;
            debug!(pair = %pair, conversation = %stored.id, "conversation already existed");
            return Ok((stored, false));
        }
        if !edges.mutual_follow() {
            return Err(not_mutual(a, b));
        }

        let candidate = Conversation::new(pair.clone(), Utc::now());
        let created = tx.execute(
            "INSERT INTO conversations (conversation_id, user_low, user_high, created_at_us)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT DO NOTHING",
            params![
                candidate.id.as_str(),
                pair.low().as_str(),
                pair.high().as_str(),
                candidate.created_at_us()
            ],
        )? == 1;

        let stored = tx.query_row(
            SELECT_CONVERSATION,
            params![pair.low().as_str(), pair.high().as_str()],
            row_to_conversation,
        )?;
        tx.commit()?;
        Ok((stored, created))
    }

    fn conversations_for(&self, user: &UserId) -> Result<Vec<Conversation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT conversation_id, user_low, user_high, created_at_us
             FROM conversations
             WHERE user_low = ?1 OR user_high = ?1
             ORDER BY created_at_us, conversation_id",
        )?;
        let rows = stmt
            .query_map([user.as_str()], row_to_conversation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl UserDirectory for SqliteStore {
    fn register(&self, user: &UserId) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO users (user_id, created_at_us) VALUES (?1, ?2)",
            params![user.as_str(), now_us()],
        )?;
        Ok(inserted == 1)
    }

    fn contains(&self, user: &UserId) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
            [user.as_str()],
            |row| row.get(0),
        )?)
    }
}
