//! Persistence backends.
//!
//! The service runs on exactly one [`Backend`], chosen once at startup from
//! [`StorageConfig`]: the in-process [`VolatileStore`] or the SQLite-backed
//! [`SqliteStore`]. If the durable store cannot be opened the service falls
//! back to the volatile one for the rest of the run.

mod pool;
pub mod sqlite;
pub mod volatile;

pub use sqlite::SqliteStore;
pub use volatile::VolatileStore;

use tracing::{error, info};

use crate::config::{StorageConfig, StorageKind};
use crate::error::Result;
use crate::record::{InboundEdges, SocialRecord};
use crate::types::PlayerId;

/// The storage capability, in one of its two variants.
#[derive(Debug)]
pub enum Backend {
    /// In-process map; every operation succeeds.
    Volatile(VolatileStore),
    /// SQLite database; operations may fail.
    Durable(SqliteStore),
}

impl Backend {
    /// Build the backend `config` asks for.
    ///
    /// A durable backend that cannot be opened is replaced by a volatile one
    /// and the failure is logged at `error` level: the service keeps running
    /// but nothing it does this run survives a restart.
    pub async fn from_config(config: &StorageConfig) -> Self {
        match config.backend {
            StorageKind::Volatile => {
                info!("Using volatile storage; social data will not survive a restart");
                Self::Volatile(VolatileStore::new())
            }
            StorageKind::Durable => match SqliteStore::open(&config.sqlite).await {
                Ok(store) => Self::Durable(store),
                Err(e) => {
                    error!(
                        path = %config.sqlite.path.display(),
                        error = %e,
                        "Failed to open durable storage; FALLING BACK TO VOLATILE STORAGE, \
                         social data from this run will be lost on restart"
                    );
                    Self::Volatile(VolatileStore::new())
                }
            },
        }
    }

    /// Which variant is active.
    #[must_use]
    pub fn kind(&self) -> StorageKind {
        match self {
            Self::Volatile(_) => StorageKind::Volatile,
            Self::Durable(_) => StorageKind::Durable,
        }
    }

    /// Fetch the record for `player`, creating a default one if absent.
    ///
    /// # Errors
    ///
    /// Only the durable variant fails, with a backend error.
    pub async fn load_or_create(
        &self,
        player: PlayerId,
        display_name: &str,
    ) -> Result<SocialRecord> {
        match self {
            Self::Volatile(store) => Ok(store.load_or_create(player, display_name)),
            Self::Durable(store) => store.load_or_create(player, display_name).await,
        }
    }

    /// Persist `record`. Last writer wins.
    ///
    /// # Errors
    ///
    /// Only the durable variant fails, with a backend error.
    pub async fn save(&self, record: &SocialRecord) -> Result<()> {
        match self {
            Self::Volatile(store) => {
                store.save(record);
                Ok(())
            }
            Self::Durable(store) => store.save(record).await,
        }
    }

    /// Edges other players hold toward `player`, used to reconcile a record
    /// on activation.
    ///
    /// # Errors
    ///
    /// Only the durable variant fails, with a backend error.
    pub async fn inbound(&self, player: PlayerId) -> Result<InboundEdges> {
        match self {
            Self::Volatile(store) => Ok(store.inbound(player)),
            Self::Durable(store) => store.inbound(player).await,
        }
    }

    /// Release external resources (the durable connection pool).
    pub fn close(&self) {
        if let Self::Durable(store) = self {
            store.close();
        }
    }
}
