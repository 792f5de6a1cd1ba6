//! Durable backend on SQLite.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE players (
//!     player_id             TEXT PRIMARY KEY,
//!     display_name          TEXT NOT NULL,
//!     notifications_enabled INTEGER NOT NULL DEFAULT 1
//! );
//! CREATE TABLE friendship_edges (       -- owner lists friend
//!     owner_id, friend_id, best_friend, PRIMARY KEY (owner_id, friend_id)
//! );
//! CREATE TABLE request_edges (          -- pending request sender -> receiver
//!     sender_id, receiver_id, created_at, PRIMARY KEY (sender_id, receiver_id)
//! );
//! CREATE TABLE restriction_edges (      -- owner blocked / ignored target
//!     owner_id, target_id, kind, PRIMARY KEY (owner_id, target_id, kind)
//! );
//! ```
//!
//! Edge tables cascade on deletion of the owning `players` row.
//!
//! A save is a sequence of independent statements, not a transaction: the
//! identity row is upserted, then each edge table owned by the record is
//! cleared and bulk-inserted again. If a later statement fails, earlier ones
//! stay committed. A failed save therefore may leave the player with fewer
//! stored edges than either the old or the new state; the next successful
//! save of the same record repairs it.
//!
//! Saves of the same player are serialized, so two of them never interleave
//! their delete and insert halves; the one that runs last is what is stored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::pool::ConnectionPool;
use crate::config::SqliteConfig;
use crate::error::Result;
use crate::record::{InboundEdges, SocialRecord};
use crate::types::PlayerId;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS players (
    player_id             TEXT PRIMARY KEY,
    display_name          TEXT NOT NULL,
    notifications_enabled INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS friendship_edges (
    owner_id    TEXT NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    friend_id   TEXT NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    best_friend INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (owner_id, friend_id)
);
CREATE INDEX IF NOT EXISTS friendship_edges_by_friend ON friendship_edges(friend_id);
CREATE TABLE IF NOT EXISTS request_edges (
    sender_id   TEXT NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    receiver_id TEXT NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (sender_id, receiver_id)
);
CREATE INDEX IF NOT EXISTS request_edges_by_receiver ON request_edges(receiver_id);
CREATE TABLE IF NOT EXISTS restriction_edges (
    owner_id  TEXT NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    target_id TEXT NOT NULL,
    kind      TEXT NOT NULL CHECK (kind IN ('blocked', 'ignored')),
    PRIMARY KEY (owner_id, target_id, kind)
);
";

const KIND_BLOCKED: &str = "blocked";
const KIND_IGNORED: &str = "ignored";

/// Handle to the SQLite database holding every player's relationships.
pub struct SqliteStore {
    pool: ConnectionPool,
    config: SqliteConfig,
    save_locks: DashMap<PlayerId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database described by `config` and make sure the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KinshipError::Database`] if the file cannot be opened
    /// or the schema cannot be created, or
    /// [`crate::KinshipError::PoolTimeout`] if no connection is available.
    pub async fn open(config: &SqliteConfig) -> Result<Self> {
        let store = Self {
            pool: ConnectionPool::new(config),
            config: config.clone(),
            save_locks: DashMap::new(),
        };
        store.run(|conn| Ok(conn.execute_batch(SCHEMA)?)).await?;

        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            wal = config.wal_mode,
            "Kinship SQLite store opened"
        );
        Ok(store)
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Run `work` on a pooled connection inside a blocking worker.
    async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let mut slot = self.pool.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let conn = slot.connection()?;
            work(conn)
        })
        .await?
    }

    // ------------------------------------------------------------------
    // Core operations
    // ------------------------------------------------------------------

    /// Upsert the identity row (refreshing the display name) and hydrate the
    /// player's record from the edge tables.
    ///
    /// # Errors
    ///
    /// Returns a backend error if any query fails.
    pub async fn load_or_create(
        &self,
        player: PlayerId,
        display_name: &str,
    ) -> Result<SocialRecord> {
        let name = display_name.to_string();
        self.run(move |conn| {
            let start = Instant::now();
            let record = hydrate(conn, player, &name)?;
            debug!(
                player = %player,
                friends = record.friends().len(),
                outgoing = record.outgoing_requests().len(),
                incoming = record.incoming_requests().len(),
                elapsed_us = start.elapsed().as_micros(),
                "Loaded social record"
            );
            Ok(record)
        })
        .await
    }

    /// Write `record` back: settings first, then a full replacement of the
    /// edges the record owns (friendships, outgoing requests, restrictions).
    ///
    /// # Errors
    ///
    /// Returns a backend error if any statement fails. Statements that ran
    /// before the failure stay committed.
    pub async fn save(&self, record: &SocialRecord) -> Result<()> {
        let lock = Arc::clone(self.save_locks.entry(record.player_id()).or_default().value());
        let _serialized = lock.lock().await;

        let record = record.clone();
        self.run(move |conn| {
            let start = Instant::now();
            write_record(conn, &record)?;
            debug!(
                player = %record.player_id(),
                friends = record.friends().len(),
                outgoing = record.outgoing_requests().len(),
                elapsed_us = start.elapsed().as_micros(),
                "Saved social record"
            );
            Ok(())
        })
        .await
    }

    /// Edges other players hold toward `player`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if a query fails.
    pub async fn inbound(&self, player: PlayerId) -> Result<InboundEdges> {
        self.run(move |conn| {
            let id = player.to_string();
            let befriended_by =
                query_ids(conn, "SELECT owner_id FROM friendship_edges WHERE friend_id = ?1", &id)?;
            let requested_by =
                query_ids(conn, "SELECT sender_id FROM request_edges WHERE receiver_id = ?1", &id)?;
            Ok(InboundEdges {
                befriended_by: befriended_by.into_iter().collect(),
                requested_by: requested_by.into_iter().collect(),
            })
        })
        .await
    }

    /// Stop handing out connections. In-flight operations finish normally.
    pub fn close(&self) {
        self.pool.close();
        info!(path = %self.config.path.display(), "Kinship SQLite store closed");
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Number of stored identities.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the query fails.
    pub async fn player_count(&self) -> Result<usize> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }

    /// Run an integrity check on the database.
    ///
    /// Returns `Ok(true)` if the database passes the check, `Ok(false)` if
    /// corruption is detected.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the check itself cannot run.
    pub async fn integrity_check(&self) -> Result<bool> {
        self.run(|conn| {
            let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            Ok(result == "ok")
        })
        .await
    }

    /// Copy the live database to `dest` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns a backend error if either database cannot be opened or the
    /// copy fails.
    pub async fn backup(&self, dest: impl Into<PathBuf>) -> Result<()> {
        let dest = dest.into();
        self.run(move |conn| {
            let start = Instant::now();
            let mut target = Connection::open(&dest)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut target)?;
            backup.run_to_completion(256, Duration::from_millis(50), None)?;
            info!(
                dest = %dest.display(),
                elapsed_ms = start.elapsed().as_millis(),
                "Database backup completed"
            );
            Ok(())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Statement helpers (run on a blocking worker)
// ---------------------------------------------------------------------------

fn hydrate(conn: &Connection, player: PlayerId, display_name: &str) -> Result<SocialRecord> {
    let id = player.to_string();

    conn.execute(
        "INSERT INTO players (player_id, display_name, notifications_enabled)
         VALUES (?1, ?2, 1)
         ON CONFLICT(player_id) DO UPDATE SET display_name = excluded.display_name",
        params![id, display_name],
    )?;

    let mut record = SocialRecord::new(player, display_name);

    let notifications: bool = conn.query_row(
        "SELECT notifications_enabled FROM players WHERE player_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    record.set_notifications_enabled(notifications);

    {
        let mut stmt = conn.prepare_cached(
            "SELECT friend_id, best_friend FROM friendship_edges WHERE owner_id = ?1",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;
        for row in rows {
            let (friend, best) = row?;
            if let Some(friend) = parse_id(&friend) {
                record.add_friend(friend);
                if best {
                    record.add_best_friend(friend);
                }
            }
        }
    }

    let sql = "SELECT receiver_id FROM request_edges WHERE sender_id = ?1";
    for target in query_ids(conn, sql, &id)? {
        record.send_request(target);
    }
    let sql = "SELECT sender_id FROM request_edges WHERE receiver_id = ?1";
    for sender in query_ids(conn, sql, &id)? {
        record.receive_request(sender);
    }

    let restrictions = {
        let mut stmt = conn
            .prepare_cached("SELECT target_id, kind FROM restriction_edges WHERE owner_id = ?1")?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };
    for (target, kind) in restrictions {
        let Some(target) = parse_id(&target) else { continue };
        match kind.as_str() {
            KIND_BLOCKED => record.block_player(target),
            KIND_IGNORED => record.ignore_player(target),
            other => warn!(player = %player, kind = %other, "Skipping unknown restriction kind"),
        }
    }

    Ok(record)
}

fn write_record(conn: &Connection, record: &SocialRecord) -> Result<()> {
    let id = record.player_id().to_string();

    conn.execute(
        "INSERT INTO players (player_id, display_name, notifications_enabled)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(player_id) DO UPDATE SET
            notifications_enabled = excluded.notifications_enabled",
        params![id, record.display_name(), record.notifications_enabled()],
    )?;

    conn.execute("DELETE FROM friendship_edges WHERE owner_id = ?1", params![id])?;
    let mut values = Vec::with_capacity(record.friends().len() * 3);
    for friend in record.friends() {
        values.push(Value::Text(id.clone()));
        values.push(Value::Text(friend.to_string()));
        values.push(Value::Integer(i64::from(record.is_best_friend(*friend))));
    }
    bulk_insert(
        conn,
        "INSERT INTO friendship_edges (owner_id, friend_id, best_friend)",
        3,
        values,
    )?;

    conn.execute("DELETE FROM request_edges WHERE sender_id = ?1", params![id])?;
    let now = Utc::now().to_rfc3339();
    let mut values = Vec::with_capacity(record.outgoing_requests().len() * 3);
    for target in record.outgoing_requests() {
        values.push(Value::Text(id.clone()));
        values.push(Value::Text(target.to_string()));
        values.push(Value::Text(now.clone()));
    }
    bulk_insert(conn, "INSERT INTO request_edges (sender_id, receiver_id, created_at)", 3, values)?;

    conn.execute("DELETE FROM restriction_edges WHERE owner_id = ?1", params![id])?;
    let restrictions = record
        .blocked()
        .iter()
        .map(|target| (target, KIND_BLOCKED))
        .chain(record.ignored().iter().map(|target| (target, KIND_IGNORED)));
    let mut values = Vec::new();
    for (target, kind) in restrictions {
        values.push(Value::Text(id.clone()));
        values.push(Value::Text(target.to_string()));
        values.push(Value::Text(kind.to_string()));
    }
    bulk_insert(conn, "INSERT INTO restriction_edges (owner_id, target_id, kind)", 3, values)?;

    Ok(())
}

/// Insert `values.len() / width` rows with a single multi-row statement.
fn bulk_insert(conn: &Connection, head: &str, width: usize, values: Vec<Value>) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    let row = format!("({})", vec!["?"; width].join(", "));
    let rows = vec![row.as_str(); values.len() / width].join(", ");
    conn.execute(&format!("{head} VALUES {rows}"), params_from_iter(values))?;
    Ok(())
}

fn query_ids(conn: &Connection, sql: &str, key: &str) -> Result<Vec<PlayerId>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        if let Some(id) = parse_id(&row?) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn parse_id(raw: &str) -> Option<PlayerId> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(id = %raw, "Skipping row with invalid UUID");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
