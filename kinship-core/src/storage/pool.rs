//! Bounded pool of SQLite connections.
//!
//! Connections are opened lazily, up to `max_connections`, and handed out
//! through a semaphore. A caller waits at most `connection_timeout_ms` for a
//! permit; after that the acquisition fails with
//! [`KinshipError::PoolTimeout`] instead of queueing indefinitely. Retrying
//! is up to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::SqliteConfig;
use crate::error::{KinshipError, Result};

/// Shared handle to the pool; clones refer to the same connections.
#[derive(Clone)]
pub(crate) struct ConnectionPool {
    shared: Arc<Shared>,
}

struct Shared {
    config: SqliteConfig,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

impl ConnectionPool {
    pub(crate) fn new(config: &SqliteConfig) -> Self {
        let size = usize::try_from(config.max_connections).unwrap_or(usize::MAX).max(1);
        Self {
            shared: Arc::new(Shared {
                config: config.clone(),
                idle: Mutex::new(Vec::with_capacity(size)),
                permits: Arc::new(Semaphore::new(size)),
            }),
        }
    }

    /// Wait for a free slot. The connection itself is opened (or reused) on
    /// first use, inside the blocking worker.
    pub(crate) async fn acquire(&self) -> Result<PooledConnection> {
        self.acquire_within(self.shared.config.connection_timeout()).await
    }

    pub(crate) async fn acquire_within(&self, timeout: Duration) -> Result<PooledConnection> {
        let start = Instant::now();
        let permits = Arc::clone(&self.shared.permits);
        let permit = tokio::time::timeout(timeout, permits.acquire_owned())
            .await
            .map_err(|_| KinshipError::PoolTimeout {
                waited_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|_| KinshipError::Worker("connection pool is closed".to_string()))?;

        let conn = self.shared.idle.lock().pop();
        Ok(PooledConnection {
            conn,
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Refuse further acquisitions and drop idle connections. Connections
    /// currently checked out are closed when returned.
    pub(crate) fn close(&self) {
        self.shared.permits.close();
        self.shared.idle.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        self.shared.idle.lock().len()
    }
}

/// A checked-out pool slot. Returns its connection to the pool on drop.
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    shared: Arc<Shared>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// The slot's connection, opening a new one if the pool had none idle.
    /// Blocking; call from a blocking worker.
    pub(crate) fn connection(&mut self) -> Result<&Connection> {
        if self.conn.is_none() {
            self.conn = Some(open_connection(&self.shared.config)?);
        }
        self.conn
            .as_ref()
            .ok_or_else(|| KinshipError::Worker("pooled connection missing".to_string()))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if !self.shared.permits.is_closed() {
                self.shared.idle.lock().push(conn);
            }
        }
    }
}

fn open_connection(config: &SqliteConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn = Connection::open_with_flags(&config.path, flags)?;

    if config.wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

    debug!(path = %config.path.display(), "Opened pooled SQLite connection");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir, max_connections: u32) -> SqliteConfig {
        SqliteConfig {
            path: dir.path().join("pool.db"),
            max_connections,
            connection_timeout_ms: 50,
            ..SqliteConfig::default()
        }
    }

    #[tokio::test]
    async fn exhausted_pool_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = ConnectionPool::new(&config(&dir, 1));

        let _held = pool.acquire().await.expect("first acquire");
        let err = pool.acquire().await.err().expect("second acquire must fail");

        assert!(matches!(err, KinshipError::PoolTimeout { .. }));
        assert!(err.is_backend_failure());
    }

    #[tokio::test]
    async fn released_connection_is_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = ConnectionPool::new(&config(&dir, 2));

        {
            let mut slot = pool.acquire().await.expect("acquire");
            slot.connection().expect("open");
        }
        assert_eq!(pool.idle_count(), 1);

        let mut slot = pool.acquire().await.expect("acquire again");
        assert_eq!(pool.idle_count(), 0);
        let one: i64 = slot
            .connection()
            .expect("reuse")
            .query_row("SELECT 1", [], |row| row.get(0))
            .expect("query");
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn closed_pool_refuses_acquisition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = ConnectionPool::new(&config(&dir, 1));
        pool.close();
        let err = pool.acquire().await.err().expect("must fail");
        assert!(matches!(err, KinshipError::Worker(_)));
    }
}
