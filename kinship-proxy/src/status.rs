//! Admin status report.

use std::fmt;

use serde::Serialize;

use kinship_core::storage::Backend;
use kinship_core::{Result, SocialService, StorageKind};

/// Snapshot of the service for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Crate version.
    pub version: String,
    /// Default locale.
    pub language: String,
    /// Backend chosen at startup.
    pub backend: StorageKind,
    /// Records currently resident.
    pub resident: usize,
    /// Players the backend knows about.
    pub stored: usize,
    /// Database integrity, for the durable backend only.
    pub integrity_ok: Option<bool>,
}

impl StatusReport {
    /// Gather a report from `service`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the durable store cannot be queried.
    pub async fn collect(service: &SocialService) -> Result<Self> {
        let (stored, integrity_ok) = match service.backend() {
            Backend::Volatile(store) => (store.len(), None),
            Backend::Durable(store) => {
                (store.player_count().await?, Some(store.integrity_check().await?))
            }
        };
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            language: service.language().to_string(),
            backend: service.backend_kind(),
            resident: service.cache().len(),
            stored,
            integrity_ok,
        })
    }

    /// Pretty JSON, for the admin endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kinship {}", self.version)?;
        writeln!(f, "  language: {}", self.language)?;
        writeln!(f, "  backend:  {}", self.backend)?;
        writeln!(f, "  resident: {}", self.resident)?;
        write!(f, "  stored:   {}", self.stored)?;
        if let Some(ok) = self.integrity_ok {
            write!(f, "\n  integrity: {}", if ok { "ok" } else { "FAILED" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::config::KinshipConfig;
    use kinship_core::PlayerId;
    use kinship_core::storage::VolatileStore;

    #[tokio::test]
    async fn volatile_report() {
        let service = SocialService::with_backend(Backend::Volatile(VolatileStore::new()));
        service.activate(PlayerId::new(), "Alice").await.expect("activate");
        let bob = PlayerId::new();
        service.activate(bob, "Bob").await.expect("activate");
        service.deactivate(bob).await.expect("deactivate");

        let report = StatusReport::collect(&service).await.expect("collect");
        assert_eq!(report.backend, StorageKind::Volatile);
        assert_eq!(report.language, "es");
        assert_eq!(report.resident, 1);
        assert_eq!(report.stored, 2);
        assert_eq!(report.integrity_ok, None);
        assert!(report.to_string().contains("backend:  volatile"));
    }

    #[tokio::test]
    async fn durable_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = KinshipConfig::default();
        config.general.language = "en".to_string();
        config.storage.backend = StorageKind::Durable;
        config.storage.sqlite.path = dir.path().join("kinship.db");

        let service = SocialService::start(&config).await.expect("start");
        service.activate(PlayerId::new(), "Alice").await.expect("activate");

        let report = StatusReport::collect(&service).await.expect("collect");
        assert_eq!(report.backend, StorageKind::Durable);
        assert_eq!(report.language, "en");
        assert_eq!(report.stored, 1);
        assert_eq!(report.integrity_ok, Some(true));

        let json = report.to_json_pretty().expect("json");
        assert!(json.contains("\"backend\": \"durable\""));
    }
}
