//! In-process backend. Nothing survives a restart.

use dashmap::DashMap;

use crate::record::{InboundEdges, SocialRecord};
use crate::types::PlayerId;

/// Records kept in a concurrent map, keyed by player.
#[derive(Debug, Default)]
pub struct VolatileStore {
    records: DashMap<PlayerId, SocialRecord>,
}

impl VolatileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored record for `player`, inserting a default one first
    /// if there is none. The returned copy carries `display_name`.
    pub fn load_or_create(&self, player: PlayerId, display_name: &str) -> SocialRecord {
        let mut entry = self
            .records
            .entry(player)
            .or_insert_with(|| SocialRecord::new(player, display_name));
        entry.set_display_name(display_name);
        entry.value().clone()
    }

    /// Overwrite the stored copy of `record`.
    pub fn save(&self, record: &SocialRecord) {
        self.records.insert(record.player_id(), record.clone());
    }

    /// Edges other stored records hold toward `player`.
    #[must_use]
    pub fn inbound(&self, player: PlayerId) -> InboundEdges {
        let mut inbound = InboundEdges::default();
        for entry in &self.records {
            let other = entry.value();
            if other.player_id() == player {
                continue;
            }
            if other.is_friend(player) {
                inbound.befriended_by.insert(other.player_id());
            }
            if other.has_sent_request_to(player) {
                inbound.requested_by.insert(other.player_id());
            }
        }
        inbound
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
