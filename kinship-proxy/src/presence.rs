//! Friend joined/left notices.
//!
//! A notice goes to every resident player who lists the subject as a friend
//! and has notifications enabled. Best friends get the joined notice flagged
//! so the proxy can render it differently.

use serde::Serialize;

use kinship_core::{PlayerId, SocialService};

/// A message to deliver to one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A friend came online.
    FriendJoined {
        /// Who receives the notice.
        recipient: PlayerId,
        /// The friend who joined.
        friend: PlayerId,
        /// The friend's display name.
        friend_name: String,
        /// Whether the recipient flagged the friend as best friend.
        best_friend: bool,
    },
    /// A friend went offline.
    FriendLeft {
        /// Who receives the notice.
        recipient: PlayerId,
        /// The friend who left.
        friend: PlayerId,
        /// The friend's display name.
        friend_name: String,
    },
}

impl Notice {
    /// Who receives the notice.
    #[must_use]
    pub fn recipient(&self) -> PlayerId {
        match self {
            Self::FriendJoined { recipient, .. } | Self::FriendLeft { recipient, .. } => *recipient,
        }
    }

    /// JSON form sent over the proxy's messaging channel.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Notices announcing that `player` came online.
#[must_use]
pub fn joined(service: &SocialService, player: PlayerId) -> Vec<Notice> {
    let name = service.cache().display_name_of(player);
    collect(service, player, |recipient, best_friend| Notice::FriendJoined {
        recipient,
        friend: player,
        friend_name: name.clone(),
        best_friend,
    })
}

/// Notices announcing that `player` went offline. Call before the player's
/// record is evicted so their display name is still known.
#[must_use]
pub fn left(service: &SocialService, player: PlayerId) -> Vec<Notice> {
    let name = service.cache().display_name_of(player);
    collect(service, player, |recipient, _| Notice::FriendLeft {
        recipient,
        friend: player,
        friend_name: name.clone(),
    })
}

fn collect(
    service: &SocialService,
    player: PlayerId,
    make: impl Fn(PlayerId, bool) -> Notice,
) -> Vec<Notice> {
    let mut notices: Vec<Notice> = service
        .cache()
        .snapshot()
        .into_iter()
        .filter(|(id, _)| *id != player)
        .filter_map(|(id, shared)| {
            let record = shared.read();
            (record.notifications_enabled() && record.is_friend(player))
                .then(|| make(id, record.is_best_friend(player)))
        })
        .collect();
    notices.sort_by_key(Notice::recipient);
    notices
}
