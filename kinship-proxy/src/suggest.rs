//! Tab-completion candidates for social commands.
//!
//! Matching is a case-insensitive prefix test on display names. Results are
//! sorted so completion cycles in a stable order.

use kinship_core::{PlayerId, SocialService};

fn matches(name: &str, prefix: &str) -> bool {
    name.to_lowercase().starts_with(&prefix.to_lowercase())
}

fn finish(mut names: Vec<String>) -> Vec<String> {
    names.sort_by_key(|name| name.to_lowercase());
    names.dedup();
    names
}

/// Names of resident players, optionally leaving out `exclude` (usually the
/// player asking).
#[must_use]
pub fn player_names(
    service: &SocialService,
    prefix: &str,
    exclude: Option<PlayerId>,
) -> Vec<String> {
    let names = service
        .cache()
        .snapshot()
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .map(|(_, shared)| shared.read().display_name().to_string())
        .filter(|name| matches(name, prefix))
        .collect();
    finish(names)
}

/// Names of `actor`'s friends. Offline friends appear by short id.
#[must_use]
pub fn friends(service: &SocialService, actor: PlayerId, prefix: &str) -> Vec<String> {
    let Some(shared) = service.lookup(actor) else {
        return Vec::new();
    };
    let ids: Vec<PlayerId> = shared.read().friends().iter().copied().collect();
    names_of(service, ids, prefix)
}

/// Names of players with a pending request to `actor`.
#[must_use]
pub fn incoming_requests(service: &SocialService, actor: PlayerId, prefix: &str) -> Vec<String> {
    let Some(shared) = service.lookup(actor) else {
        return Vec::new();
    };
    let ids: Vec<PlayerId> = shared.read().incoming_requests().iter().copied().collect();
    names_of(service, ids, prefix)
}

fn names_of(service: &SocialService, ids: Vec<PlayerId>, prefix: &str) -> Vec<String> {
    let names = ids
        .into_iter()
        .map(|id| service.cache().display_name_of(id))
        .filter(|name| matches(name, prefix))
        .collect();
    finish(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::storage::{Backend, VolatileStore};

    async fn service_with(names: &[&str]) -> (SocialService, Vec<PlayerId>) {
        let service = SocialService::with_backend(Backend::Volatile(VolatileStore::new()));
        let mut ids = Vec::new();
        for name in names {
            let id = PlayerId::new();
            service.activate(id, name).await.expect("activate");
            ids.push(id);
        }
        (service, ids)
    }

    #[tokio::test]
    async fn player_names_filter_by_prefix() {
        let (service, ids) = service_with(&["Alice", "alfred", "Bob"]).await;

        assert_eq!(player_names(&service, "AL", None), vec!["alfred", "Alice"]);
        assert_eq!(player_names(&service, "al", Some(ids[0])), vec!["alfred"]);
        assert_eq!(player_names(&service, "", None).len(), 3);
    }

    #[tokio::test]
    async fn friends_and_requests() {
        let (service, ids) = service_with(&["Alice", "Bob", "Bea", "Carl"]).await;
        let (alice, bob, bea, carl) = (ids[0], ids[1], ids[2], ids[3]);

        service.add_friend(alice, bob).await.expect("bob");
        service.add_friend(alice, carl).await.expect("carl");
        service.request(bea, alice).await.expect("bea");

        assert_eq!(friends(&service, alice, "b"), vec!["Bob"]);
        assert_eq!(friends(&service, alice, ""), vec!["Bob", "Carl"]);
        assert_eq!(incoming_requests(&service, alice, "B"), vec!["Bea"]);
        assert!(incoming_requests(&service, bob, "").is_empty());
    }

    #[tokio::test]
    async fn offline_friend_shows_short_id() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);
        service.add_friend(alice, bob).await.expect("befriend");
        service.deactivate(bob).await.expect("leave");

        assert_eq!(friends(&service, alice, ""), vec![bob.short()]);
    }

    #[test]
    fn absent_actor_has_no_suggestions() {
        let service = SocialService::with_backend(Backend::Volatile(VolatileStore::new()));
        assert!(friends(&service, PlayerId::new(), "").is_empty());
    }
}
