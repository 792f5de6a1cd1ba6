//! Fixtures shared by the Kinship benchmarks.

use kinship_core::storage::{Backend, VolatileStore};
use kinship_core::{PlayerId, SocialRecord, SocialService};

/// A record with `friends` friends, every fourth flagged best friend, and
/// `requests` pending requests in each direction.
#[must_use]
pub fn populated_record(friends: usize, requests: usize) -> SocialRecord {
    let mut record = SocialRecord::new(PlayerId::new(), "bench");
    for i in 0..friends {
        let friend = PlayerId::new();
        record.add_friend(friend);
        if i % 4 == 0 {
            record.add_best_friend(friend);
        }
    }
    for _ in 0..requests {
        record.send_request(PlayerId::new());
        record.receive_request(PlayerId::new());
    }
    record
}

/// A volatile service with `players` resident players, each befriended with
/// the next one in a ring.
///
/// # Panics
///
/// Panics if activation fails, which the volatile backend never does.
pub async fn ring_service(players: usize) -> (SocialService, Vec<PlayerId>) {
    let service = SocialService::with_backend(Backend::Volatile(VolatileStore::new()));
    let mut ids = Vec::with_capacity(players);
    for i in 0..players {
        let id = PlayerId::new();
        service.activate(id, &format!("player{i}")).await.expect("volatile activation");
        ids.push(id);
    }
    for pair in ids.windows(2) {
        service.add_friend(pair[0], pair[1]).await.expect("volatile save");
    }
    (service, ids)
}
