//! Session lifecycle events reported by the proxy.

use kinship_core::PlayerId;

/// Something that happened to a player's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The player authenticated with the proxy.
    Login {
        /// Who logged in.
        player: PlayerId,
        /// Name the player logged in with.
        name: String,
    },

    /// The player finished connecting to a backend server.
    ServerConnected {
        /// Who connected.
        player: PlayerId,
        /// Name of the backend server.
        server: String,
        /// `true` for the first server of the session, `false` on a switch.
        first_connection: bool,
    },

    /// The player left the network.
    Disconnect {
        /// Who left.
        player: PlayerId,
    },
}

impl SessionEvent {
    /// The player this event is about.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        match self {
            Self::Login { player, .. }
            | Self::ServerConnected { player, .. }
            | Self::Disconnect { player } => *player,
        }
    }
}

/// Build a login event.
#[must_use]
pub fn on_login(player: PlayerId, name: impl Into<String>) -> SessionEvent {
    SessionEvent::Login {
        player,
        name: name.into(),
    }
}

/// Build a server-connected event.
#[must_use]
pub fn on_server_connected(
    player: PlayerId,
    server: impl Into<String>,
    first_connection: bool,
) -> SessionEvent {
    SessionEvent::ServerConnected {
        player,
        server: server.into(),
        first_connection,
    }
}

/// Build a disconnect event.
#[must_use]
pub fn on_disconnect(player: PlayerId) -> SessionEvent {
    SessionEvent::Disconnect { player }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_names_its_player() {
        let player = PlayerId::new();
        assert_eq!(on_login(player, "Alice").player(), player);
        assert_eq!(on_server_connected(player, "lobby", true).player(), player);
        assert_eq!(on_disconnect(player).player(), player);
    }
}
