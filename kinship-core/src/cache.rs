//! Resident social records.
//!
//! The [`RecordCache`] owns the records of players who are currently online.
//! It is created by, and lives as long as, the [`crate::SocialService`];
//! nothing reaches it through globals. Lookups never touch storage: a miss
//! means "not loaded yet" and callers must surface that as
//! [`KinshipError::NotReady`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::error::{KinshipError, Result};
use crate::record::SocialRecord;
use crate::storage::Backend;
use crate::types::PlayerId;

/// A resident record. The lock is held for one record operation at a time,
/// never across an `.await` or while another record is locked.
pub type SharedRecord = Arc<RwLock<SocialRecord>>;

/// Concurrent map from player to resident record.
#[derive(Debug)]
pub struct RecordCache {
    records: DashMap<PlayerId, SharedRecord>,
    backend: Arc<Backend>,
}

impl RecordCache {
    /// Create an empty cache backed by `backend`.
    #[must_use]
    pub fn new(backend: Arc<Backend>) -> Self {
        Self {
            records: DashMap::new(),
            backend,
        }
    }

    /// The backend this cache loads from and persists to.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Load the player's record and make it resident.
    ///
    /// The loaded record is reconciled against what other players' stored
    /// records say about it (requests accepted or friendships dropped while
    /// the player was away); a reconciled record is persisted straight away.
    /// Concurrent activations of the same player are not de-duplicated: the
    /// last one to finish owns the cache slot.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the record cannot be loaded. The player
    /// then stays non-resident.
    pub async fn activate(&self, player: PlayerId, display_name: &str) -> Result<SharedRecord> {
        let start = Instant::now();

        let mut record = self
            .backend
            .load_or_create(player, display_name)
            .await
            .inspect_err(|e| error!(player = %player, error = %e, "Failed to load social record"))?;

        let inbound = self
            .backend
            .inbound(player)
            .await
            .inspect_err(|e| error!(player = %player, error = %e, "Failed to read inbound edges"))?;

        let report = record.reconcile(&inbound);
        if !report.is_empty() {
            info!(
                player = %player,
                accepted = report.accepted_while_away.len(),
                removed = report.removed_while_away.len(),
                "Reconciled social record with changes made while offline"
            );
            // The reconciled state is correct in memory; a failed write here
            // is retried by the next mutation or by eviction.
            if let Err(e) = self.backend.save(&record).await {
                error!(player = %player, error = %e, "Failed to persist reconciled social record");
            }
        }

        let shared = Arc::new(RwLock::new(record));
        self.records.insert(player, Arc::clone(&shared));

        debug!(
            player = %player,
            resident = self.records.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Activated social record"
        );
        Ok(shared)
    }

    /// Evict the player's record and persist it one last time. A player
    /// that is not resident is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the final save fails; the record is evicted
    /// regardless.
    pub async fn deactivate(&self, player: PlayerId) -> Result<()> {
        let Some((_, shared)) = self.records.remove(&player) else {
            return Ok(());
        };
        self.persist(&shared).await?;
        debug!(player = %player, resident = self.records.len(), "Deactivated social record");
        Ok(())
    }

    /// Resident record for `player`, if loaded.
    #[must_use]
    pub fn get(&self, player: PlayerId) -> Option<SharedRecord> {
        self.records.get(&player).map(|entry| Arc::clone(entry.value()))
    }

    /// Resident record for `player`, or [`KinshipError::NotReady`].
    ///
    /// # Errors
    ///
    /// Returns [`KinshipError::NotReady`] if the record is not resident.
    pub fn require(&self, player: PlayerId) -> Result<SharedRecord> {
        self.get(player).ok_or(KinshipError::NotReady(player))
    }

    /// Point-in-time copy of the resident map. Entries are read one by one;
    /// there is no consistency across them.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<PlayerId, SharedRecord> {
        self.records
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    /// Resident player whose display name matches `name`, ignoring case.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        self.records
            .iter()
            .find(|entry| entry.value().read().display_name().eq_ignore_ascii_case(name))
            .map(|entry| *entry.key())
    }

    /// Display name of a resident player, or the short form of their id.
    #[must_use]
    pub fn display_name_of(&self, player: PlayerId) -> String {
        self.get(player)
            .map_or_else(|| player.short(), |shared| shared.read().display_name().to_string())
    }

    /// Number of resident records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist the current state of one resident record.
    ///
    /// # Errors
    ///
    /// Returns (and logs) the backend error if the save fails. The in-memory
    /// record is left as is.
    pub async fn persist(&self, shared: &SharedRecord) -> Result<()> {
        let snapshot = shared.read().clone();
        self.backend.save(&snapshot).await.inspect_err(|e| {
            error!(
                player = %snapshot.player_id(),
                error = %e,
                "Failed to persist social record; in-memory state is ahead of storage"
            );
        })
    }

    /// Persist every resident record, returning how many were saved.
    ///
    /// # Errors
    ///
    /// Every record is attempted; the first failure is returned afterwards.
    pub async fn flush_all(&self) -> Result<usize> {
        let mut saved = 0;
        let mut first_error = None;
        for shared in self.snapshot().into_values() {
            match self.persist(&shared).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }
}
