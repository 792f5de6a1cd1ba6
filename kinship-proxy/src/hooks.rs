//! Session event handling.
//!
//! The proxy calls [`SessionHooks::handle`] for every lifecycle event and
//! delivers the returned notices.

use std::sync::Arc;

use tracing::{debug, error};

use kinship_core::{Result, SocialService};

use crate::events::SessionEvent;
use crate::presence::{self, Notice};

/// Event handler bound to a running service.
#[derive(Debug, Clone)]
pub struct SessionHooks {
    service: Arc<SocialService>,
}

impl SessionHooks {
    /// Bind hooks to `service`.
    #[must_use]
    pub fn new(service: Arc<SocialService>) -> Self {
        Self { service }
    }

    /// The service events are applied to.
    #[must_use]
    pub fn service(&self) -> &SocialService {
        &self.service
    }

    /// Apply `event` and return the notices it produces.
    ///
    /// - `Login` loads the player's record.
    /// - The first `ServerConnected` of a session announces the player to
    ///   their online friends; server switches announce nothing.
    /// - `Disconnect` announces the departure, then evicts and saves the
    ///   record.
    ///
    /// # Errors
    ///
    /// Returns the backend error if loading or the final save fails. The
    /// failure is logged here as well.
    pub async fn handle(&self, event: SessionEvent) -> Result<Vec<Notice>> {
        match event {
            SessionEvent::Login { player, name } => {
                self.service
                    .activate(player, &name)
                    .await
                    .inspect_err(|e| {
                        error!(player = %player, error = %e, "Could not load social data on login");
                    })?;
                Ok(Vec::new())
            }
            SessionEvent::ServerConnected {
                player,
                server,
                first_connection,
            } => {
                if !first_connection {
                    debug!(player = %player, server = %server, "Server switch, no presence notice");
                    return Ok(Vec::new());
                }
                let notices = presence::joined(&self.service, player);
                debug!(
                    player = %player,
                    server = %server,
                    notices = notices.len(),
                    "Announced join"
                );
                Ok(notices)
            }
            SessionEvent::Disconnect { player } => {
                let notices = presence::left(&self.service, player);
                self.service
                    .deactivate(player)
                    .await
                    .inspect_err(|e| {
                        error!(
                            player = %player,
                            error = %e,
                            "Could not save social data on disconnect"
                        );
                    })?;
                debug!(player = %player, notices = notices.len(), "Announced departure");
                Ok(notices)
            }
        }
    }
}
