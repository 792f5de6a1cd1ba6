//! The social service: one backend, one record cache, the protocol.
//!
//! A [`SocialService`] is the explicit owner of all shared state. It is
//! started once, handed by reference to whatever needs it, and stopped once.

use std::sync::Arc;

use tracing::{error, info};

use crate::cache::{RecordCache, SharedRecord};
use crate::config::{GeneralConfig, KinshipConfig, StorageKind};
use crate::error::Result;
use crate::storage::Backend;
use crate::types::PlayerId;

/// Owner of the backend and the resident records.
#[derive(Debug)]
pub struct SocialService {
    cache: RecordCache,
    language: String,
}

impl SocialService {
    /// Validate `config`, make the one-time backend decision and build the
    /// service.
    ///
    /// A durable backend that cannot be opened is replaced by the volatile
    /// one; see [`Backend::from_config`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::KinshipError::Config`] if the configuration is
    /// invalid.
    pub async fn start(config: &KinshipConfig) -> Result<Self> {
        config.validate()?;
        let backend = Backend::from_config(&config.storage).await;
        let service = Self::build(backend, config.general.language.clone());
        info!(
            backend = %service.backend_kind(),
            language = %service.language,
            "Social service started"
        );
        Ok(service)
    }

    /// Build a service over an already chosen backend, with default
    /// general settings.
    #[must_use]
    pub fn with_backend(backend: Backend) -> Self {
        Self::build(backend, GeneralConfig::default().language)
    }

    fn build(backend: Backend, language: String) -> Self {
        Self {
            cache: RecordCache::new(Arc::new(backend)),
            language,
        }
    }

    /// The resident record cache.
    #[must_use]
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// The backend chosen at startup.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        self.cache.backend()
    }

    /// Which backend variant is in use.
    #[must_use]
    pub fn backend_kind(&self) -> StorageKind {
        self.backend().kind()
    }

    /// Default locale for player-facing text.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Session start: load and make resident.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the record cannot be loaded.
    pub async fn activate(&self, player: PlayerId, display_name: &str) -> Result<SharedRecord> {
        self.cache.activate(player, display_name).await
    }

    /// Session end: evict and persist.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the final save fails.
    pub async fn deactivate(&self, player: PlayerId) -> Result<()> {
        self.cache.deactivate(player).await
    }

    /// Resident record for `player`. `None` means "not ready yet", never
    /// "no relationships".
    #[must_use]
    pub fn lookup(&self, player: PlayerId) -> Option<SharedRecord> {
        self.cache.get(player)
    }

    /// Persist every resident record and release the backend. Returns how
    /// many records were saved.
    ///
    /// # Errors
    ///
    /// Returns the first save failure. The backend is closed regardless.
    pub async fn stop(&self) -> Result<usize> {
        let flushed = self.cache.flush_all().await;
        self.backend().close();
        match &flushed {
            Ok(saved) => info!(saved, "Social service stopped"),
            Err(e) => error!(error = %e, "Social service stopped with unsaved records"),
        }
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VolatileStore;

    #[tokio::test]
    async fn start_with_defaults_is_volatile() {
        let service = SocialService::start(&KinshipConfig::default()).await.expect("start");
        assert_eq!(service.backend_kind(), StorageKind::Volatile);
        assert_eq!(service.language(), "es");
    }

    #[tokio::test]
    async fn start_rejects_invalid_config() {
        let mut config = KinshipConfig::default();
        config.storage.sqlite.max_connections = 0;
        assert!(SocialService::start(&config).await.is_err());
    }

    #[tokio::test]
    async fn start_on_durable_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = KinshipConfig::default();
        config.storage.backend = StorageKind::Durable;
        config.storage.sqlite.path = dir.path().join("kinship.db");

        let service = SocialService::start(&config).await.expect("start");
        assert_eq!(service.backend_kind(), StorageKind::Durable);
        service.activate(PlayerId::new(), "Alice").await.expect("activate");
        assert_eq!(service.stop().await.expect("stop"), 1);
    }

    #[tokio::test]
    async fn lookup_reflects_session_lifecycle() {
        let service = SocialService::with_backend(Backend::Volatile(VolatileStore::new()));
        let alice = PlayerId::new();

        assert!(service.lookup(alice).is_none());
        service.activate(alice, "Alice").await.expect("activate");
        assert!(service.lookup(alice).is_some());
        service.deactivate(alice).await.expect("deactivate");
        assert!(service.lookup(alice).is_none());
    }
}
