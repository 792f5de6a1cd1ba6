//! Two-record relationship protocol.
//!
//! Every cross-record operation is two independent single-record mutations
//! followed by two independent saves. There is no lock spanning both records
//! and no two-phase commit: if the other party is not resident, or one of the
//! saves fails, only one side is updated. The offline side catches up through
//! reconciliation when its record is next activated (see
//! [`crate::RecordCache::activate`]).
//!
//! Guards are checked and mutations applied in separate lock scopes, so two
//! concurrent operations on the same pair can both pass a guard. Set
//! semantics make the duplicate mutation a no-op.

use std::fmt;

use tracing::{debug, info};

use crate::cache::SharedRecord;
use crate::error::Result;
use crate::service::SocialService;
use crate::types::PlayerId;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a protocol operation that reached a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The change was applied.
    Done,
    /// A request now waits for the target's answer.
    RequestSent,
    /// The two players are now friends.
    Befriended,
    /// Join/leave notifications are now in the given state.
    Notifications(bool),
    /// A precondition failed; nothing changed.
    Rejected(Rejection),
}

impl Outcome {
    /// Whether anything was changed.
    #[must_use]
    pub fn is_applied(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// The rejection reason, if rejected.
    #[must_use]
    pub fn rejection(self) -> Option<Rejection> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why a protocol operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Actor and target are the same player.
    SelfTarget,
    /// The target has blocked the actor.
    BlockedByTarget,
    /// The actor has blocked the target.
    TargetBlocked,
    /// The two players are already friends.
    AlreadyFriends,
    /// The actor already has a pending request to the target.
    RequestAlreadySent,
    /// There is no pending request to act on.
    NoSuchRequest,
    /// The target is not a friend.
    NotFriends,
    /// The target is already flagged as best friend.
    AlreadyBestFriend,
    /// The target is not flagged as best friend.
    NotBestFriend,
    /// The target is already blocked.
    AlreadyBlocked,
    /// The target is not blocked.
    NotBlocked,
    /// The target is already ignored.
    AlreadyIgnored,
    /// The target is not ignored.
    NotIgnored,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SelfTarget => "cannot target yourself",
            Self::BlockedByTarget => "target has blocked you",
            Self::TargetBlocked => "you have blocked the target",
            Self::AlreadyFriends => "already friends",
            Self::RequestAlreadySent => "request already sent",
            Self::NoSuchRequest => "no such request",
            Self::NotFriends => "not friends",
            Self::AlreadyBestFriend => "already a best friend",
            Self::NotBestFriend => "not a best friend",
            Self::AlreadyBlocked => "already blocked",
            Self::NotBlocked => "not blocked",
            Self::AlreadyIgnored => "already ignored",
            Self::NotIgnored => "not ignored",
        };
        f.write_str(text)
    }
}

fn reject(
    operation: &'static str,
    actor: PlayerId,
    target: PlayerId,
    reason: Rejection,
) -> Result<Outcome> {
    debug!(
        operation,
        actor = %actor,
        target = %target,
        reason = %reason,
        "Social operation rejected"
    );
    Ok(Outcome::Rejected(reason))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl SocialService {
    /// `actor` asks `target` to be friends.
    ///
    /// If `target` already has a pending request to `actor`, this is an
    /// implicit accept and yields [`Outcome::Befriended`].
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if either record is not resident;
    /// a backend error if a save fails (the in-memory change is kept).
    pub async fn request(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        const OP: &str = "request";
        if actor == target {
            return reject(OP, actor, target, Rejection::SelfTarget);
        }
        let actor_record = self.cache().require(actor)?;
        let target_record = self.cache().require(target)?;

        if target_record.read().has_blocked(actor) {
            return reject(OP, actor, target, Rejection::BlockedByTarget);
        }
        let implicit_accept = {
            let record = actor_record.read();
            if record.has_blocked(target) {
                return reject(OP, actor, target, Rejection::TargetBlocked);
            }
            if record.is_friend(target) {
                return reject(OP, actor, target, Rejection::AlreadyFriends);
            }
            if record.has_sent_request_to(target) {
                return reject(OP, actor, target, Rejection::RequestAlreadySent);
            }
            record.has_pending_request_from(target)
        };
        if implicit_accept {
            debug!(actor = %actor, target = %target, "Crossed requests, accepting instead");
            return self.accept(actor, target).await;
        }

        actor_record.write().send_request(target);
        target_record.write().receive_request(actor);
        self.persist_both(&actor_record, Some(&target_record)).await?;

        info!(actor = %actor, target = %target, "Friend request sent");
        Ok(Outcome::RequestSent)
    }

    /// `actor` accepts the pending request from `sender`.
    ///
    /// The sender's record is updated only if resident.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if a save fails.
    pub async fn accept(&self, actor: PlayerId, sender: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        if !actor_record.write().accept_request(sender) {
            return reject("accept", actor, sender, Rejection::NoSuchRequest);
        }

        let sender_record = self.cache().get(sender);
        if let Some(record) = &sender_record {
            record.write().add_friend(actor);
        }
        self.persist_both(&actor_record, sender_record.as_ref()).await?;

        info!(
            actor = %actor,
            sender = %sender,
            sender_resident = sender_record.is_some(),
            "Friend request accepted"
        );
        Ok(Outcome::Befriended)
    }

    /// `actor` turns down the pending request from `sender`.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if a save fails.
    pub async fn deny(&self, actor: PlayerId, sender: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        if !actor_record.write().deny_request(sender) {
            return reject("deny", actor, sender, Rejection::NoSuchRequest);
        }

        let sender_record = self.cache().get(sender);
        if let Some(record) = &sender_record {
            record.write().cancel_request(actor);
        }
        self.persist_both(&actor_record, sender_record.as_ref()).await?;

        info!(actor = %actor, sender = %sender, "Friend request denied");
        Ok(Outcome::Done)
    }

    /// `actor` withdraws their pending request to `target`.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if a save fails.
    pub async fn cancel(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if !record.has_sent_request_to(target) {
                return reject("cancel", actor, target, Rejection::NoSuchRequest);
            }
            record.cancel_request(target);
        }

        let target_record = self.cache().get(target);
        if let Some(record) = &target_record {
            record.write().deny_request(actor);
        }
        self.persist_both(&actor_record, target_record.as_ref()).await?;

        info!(actor = %actor, target = %target, "Friend request cancelled");
        Ok(Outcome::Done)
    }

    /// Make `actor` and `target` friends directly, without a request.
    /// Both records must be resident.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if either record is not resident;
    /// a backend error if a save fails.
    pub async fn add_friend(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        const OP: &str = "add_friend";
        if actor == target {
            return reject(OP, actor, target, Rejection::SelfTarget);
        }
        let actor_record = self.cache().require(actor)?;
        let target_record = self.cache().require(target)?;

        if target_record.read().has_blocked(actor) {
            return reject(OP, actor, target, Rejection::BlockedByTarget);
        }
        {
            let record = actor_record.read();
            if record.has_blocked(target) {
                return reject(OP, actor, target, Rejection::TargetBlocked);
            }
            if record.is_friend(target) {
                return reject(OP, actor, target, Rejection::AlreadyFriends);
            }
        }

        actor_record.write().add_friend(target);
        target_record.write().add_friend(actor);
        self.persist_both(&actor_record, Some(&target_record)).await?;

        info!(actor = %actor, target = %target, "Friendship added");
        Ok(Outcome::Befriended)
    }

    /// End the friendship between `actor` and `friend`.
    ///
    /// The friend's record is updated only if resident; otherwise it drops
    /// `actor` when it is next activated.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if a save fails.
    pub async fn remove_friend(&self, actor: PlayerId, friend: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if !record.is_friend(friend) {
                return reject("remove_friend", actor, friend, Rejection::NotFriends);
            }
            record.remove_friend(friend);
        }

        let friend_record = self.cache().get(friend);
        if let Some(record) = &friend_record {
            record.write().remove_friend(actor);
        }
        self.persist_both(&actor_record, friend_record.as_ref()).await?;

        info!(actor = %actor, friend = %friend, "Friendship removed");
        Ok(Outcome::Done)
    }

    /// Flag `friend` as one of `actor`'s best friends. Single-sided.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if the save fails.
    pub async fn add_best_friend(&self, actor: PlayerId, friend: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if record.is_best_friend(friend) {
                return reject("add_best_friend", actor, friend, Rejection::AlreadyBestFriend);
            }
            if !record.add_best_friend(friend) {
                return reject("add_best_friend", actor, friend, Rejection::NotFriends);
            }
        }
        self.persist_both(&actor_record, None).await?;

        info!(actor = %actor, friend = %friend, "Best friend added");
        Ok(Outcome::Done)
    }

    /// Clear the best-friend flag on `friend`. Single-sided.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if the save fails.
    pub async fn remove_best_friend(&self, actor: PlayerId, friend: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if !record.is_best_friend(friend) {
                return reject("remove_best_friend", actor, friend, Rejection::NotBestFriend);
            }
            record.remove_best_friend(friend);
        }
        self.persist_both(&actor_record, None).await?;

        info!(actor = %actor, friend = %friend, "Best friend removed");
        Ok(Outcome::Done)
    }

    /// `actor` blocks `target`, ending any friendship or pending request
    /// between them. The target's side is cleaned up if resident.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if a save fails.
    pub async fn block(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        if actor == target {
            return reject("block", actor, target, Rejection::SelfTarget);
        }
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if record.has_blocked(target) {
                return reject("block", actor, target, Rejection::AlreadyBlocked);
            }
            record.block_player(target);
        }

        let target_record = self.cache().get(target);
        if let Some(record) = &target_record {
            let mut record = record.write();
            record.remove_friend(actor);
            record.cancel_request(actor);
            record.deny_request(actor);
        }
        self.persist_both(&actor_record, target_record.as_ref()).await?;

        info!(actor = %actor, target = %target, "Player blocked");
        Ok(Outcome::Done)
    }

    /// Lift a block. Nothing the block removed comes back.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if the save fails.
    pub async fn unblock(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if !record.has_blocked(target) {
                return reject("unblock", actor, target, Rejection::NotBlocked);
            }
            record.unblock_player(target);
        }
        self.persist_both(&actor_record, None).await?;

        info!(actor = %actor, target = %target, "Player unblocked");
        Ok(Outcome::Done)
    }

    /// `actor` ignores `target`. Single-sided.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if the save fails.
    pub async fn ignore(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        if actor == target {
            return reject("ignore", actor, target, Rejection::SelfTarget);
        }
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if record.has_ignored(target) {
                return reject("ignore", actor, target, Rejection::AlreadyIgnored);
            }
            record.ignore_player(target);
        }
        self.persist_both(&actor_record, None).await?;

        info!(actor = %actor, target = %target, "Player ignored");
        Ok(Outcome::Done)
    }

    /// `actor` stops ignoring `target`.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if the save fails.
    pub async fn unignore(&self, actor: PlayerId, target: PlayerId) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        {
            let mut record = actor_record.write();
            if !record.has_ignored(target) {
                return reject("unignore", actor, target, Rejection::NotIgnored);
            }
            record.unignore_player(target);
        }
        self.persist_both(&actor_record, None).await?;

        info!(actor = %actor, target = %target, "Player unignored");
        Ok(Outcome::Done)
    }

    /// Set join/leave notifications for `actor`; `None` toggles.
    /// Yields [`Outcome::Notifications`] with the resulting state.
    ///
    /// # Errors
    ///
    /// [`crate::KinshipError::NotReady`] if the actor is not resident;
    /// a backend error if the save fails.
    pub async fn set_notifications(
        &self,
        actor: PlayerId,
        enabled: Option<bool>,
    ) -> Result<Outcome> {
        let actor_record = self.cache().require(actor)?;
        let enabled = {
            let mut record = actor_record.write();
            let enabled = enabled.unwrap_or(!record.notifications_enabled());
            record.set_notifications_enabled(enabled);
            enabled
        };
        self.persist_both(&actor_record, None).await?;

        info!(actor = %actor, enabled, "Notifications updated");
        Ok(Outcome::Notifications(enabled))
    }

    /// Save the actor's record and, if given, the other party's. Both saves
    /// are attempted; the first failure is returned.
    async fn persist_both(&self, actor: &SharedRecord, other: Option<&SharedRecord>) -> Result<()> {
        let first = self.cache().persist(actor).await;
        let second = match other {
            Some(record) => self.cache().persist(record).await,
            None => Ok(()),
        };
        first.and(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KinshipError;
    use crate::storage::{Backend, VolatileStore};

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

    fn record(service: &SocialService, id: PlayerId) -> crate::record::SocialRecord {
        service.lookup(id).expect("resident").read().clone()
    }

    #[tokio::test]
    async fn request_then_accept_is_symmetric() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        assert_eq!(service.request(alice, bob).await.expect("request"), Outcome::RequestSent);
        assert!(record(&service, bob).has_pending_request_from(alice));

        assert_eq!(service.accept(bob, alice).await.expect("accept"), Outcome::Befriended);
        let (a, b) = (record(&service, alice), record(&service, bob));
        assert!(a.is_friend(bob) && b.is_friend(alice));
        assert!(a.outgoing_requests().is_empty() && a.incoming_requests().is_empty());
        assert!(b.outgoing_requests().is_empty() && b.incoming_requests().is_empty());
    }

    #[tokio::test]
    async fn request_guards() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        let self_request = service.request(alice, alice).await.expect("self");
        assert_eq!(self_request.rejection(), Some(Rejection::SelfTarget));

        service.request(alice, bob).await.expect("first");
        let again = service.request(alice, bob).await.expect("again");
        assert_eq!(again, Outcome::Rejected(Rejection::RequestAlreadySent));
        assert_eq!(record(&service, alice).outgoing_requests().len(), 1);

        service.accept(bob, alice).await.expect("accept");
        let friends = service.request(alice, bob).await.expect("friends");
        assert_eq!(friends.rejection(), Some(Rejection::AlreadyFriends));
    }

    #[tokio::test]
    async fn blocked_requests_are_refused() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        service.block(bob, alice).await.expect("block");
        let outcome = service.request(alice, bob).await.expect("request");
        assert_eq!(outcome.rejection(), Some(Rejection::BlockedByTarget));

        let outcome = service.request(bob, alice).await.expect("request");
        assert_eq!(outcome.rejection(), Some(Rejection::TargetBlocked));
        assert!(!outcome.is_applied());
    }

    #[tokio::test]
    async fn request_to_non_resident_target_is_not_ready() {
        let (service, ids) = service_with(&["Alice"]).await;
        let ghost = PlayerId::new();
        let err = service.request(ids[0], ghost).await.expect_err("offline");
        assert!(matches!(err, KinshipError::NotReady(id) if id == ghost));
    }

    #[tokio::test]
    async fn crossed_requests_become_friends() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        service.request(alice, bob).await.expect("a->b");
        let outcome = service.request(bob, alice).await.expect("b->a");
        assert_eq!(outcome, Outcome::Befriended);

        let (a, b) = (record(&service, alice), record(&service, bob));
        assert!(a.is_friend(bob) && b.is_friend(alice));
        assert!(!a.has_sent_request_to(bob) && !b.has_pending_request_from(alice));
    }

    #[tokio::test]
    async fn deny_and_cancel_clear_both_sides() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        service.request(alice, bob).await.expect("request");
        assert_eq!(service.deny(bob, alice).await.expect("deny"), Outcome::Done);
        assert!(!record(&service, alice).has_sent_request_to(bob));
        assert_eq!(
            service.deny(bob, alice).await.expect("deny again").rejection(),
            Some(Rejection::NoSuchRequest)
        );

        service.request(alice, bob).await.expect("request");
        assert_eq!(service.cancel(alice, bob).await.expect("cancel"), Outcome::Done);
        assert!(!record(&service, bob).has_pending_request_from(alice));
        assert_eq!(
            service.cancel(alice, bob).await.expect("cancel again").rejection(),
            Some(Rejection::NoSuchRequest)
        );
    }

    #[tokio::test]
    async fn remove_friend_drops_best_friend_flag() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        service.add_friend(alice, bob).await.expect("add");
        service.add_best_friend(alice, bob).await.expect("best");
        assert!(record(&service, alice).is_best_friend(bob));

        service.remove_friend(alice, bob).await.expect("remove");
        let (a, b) = (record(&service, alice), record(&service, bob));
        assert!(!a.is_friend(bob) && !a.is_best_friend(bob));
        assert!(!b.is_friend(alice));

        let again = service.remove_friend(alice, bob).await.expect("again");
        assert_eq!(again.rejection(), Some(Rejection::NotFriends));
    }

    #[tokio::test]
    async fn best_friend_requires_friendship() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        let outcome = service.add_best_friend(alice, bob).await.expect("best");
        assert_eq!(outcome.rejection(), Some(Rejection::NotFriends));

        service.add_friend(alice, bob).await.expect("add");
        service.add_best_friend(alice, bob).await.expect("best");
        let again = service.add_best_friend(alice, bob).await.expect("again");
        assert_eq!(again.rejection(), Some(Rejection::AlreadyBestFriend));
        assert!(!record(&service, bob).is_best_friend(alice));

        service.remove_best_friend(alice, bob).await.expect("unflag");
        assert!(record(&service, alice).is_friend(bob));
        let again = service.remove_best_friend(alice, bob).await.expect("again");
        assert_eq!(again.rejection(), Some(Rejection::NotBestFriend));
    }

    #[tokio::test]
    async fn block_strips_both_records() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        service.add_friend(alice, bob).await.expect("add");
        service.add_best_friend(bob, alice).await.expect("best");
        service.block(alice, bob).await.expect("block");

        let (a, b) = (record(&service, alice), record(&service, bob));
        assert!(a.has_blocked(bob) && !a.is_friend(bob));
        assert!(!b.is_friend(alice) && !b.is_best_friend(alice));

        let again = service.block(alice, bob).await.expect("again");
        assert_eq!(again.rejection(), Some(Rejection::AlreadyBlocked));

        service.unblock(alice, bob).await.expect("unblock");
        let a = record(&service, alice);
        assert!(!a.has_blocked(bob) && !a.is_friend(bob));
        let again = service.unblock(alice, bob).await.expect("again");
        assert_eq!(again.rejection(), Some(Rejection::NotBlocked));
    }

    #[tokio::test]
    async fn ignore_is_single_sided() {
        let (service, ids) = service_with(&["Alice", "Bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);

        service.ignore(alice, bob).await.expect("ignore");
        assert!(record(&service, alice).has_ignored(bob));
        assert!(!record(&service, bob).has_ignored(alice));
        assert_eq!(
            service.ignore(alice, bob).await.expect("again").rejection(),
            Some(Rejection::AlreadyIgnored)
        );

        service.unignore(alice, bob).await.expect("unignore");
        assert!(!record(&service, alice).has_ignored(bob));
        assert_eq!(
            service.unignore(alice, bob).await.expect("again").rejection(),
            Some(Rejection::NotIgnored)
        );
    }

    #[tokio::test]
    async fn notifications_toggle_and_set() {
        let (service, ids) = service_with(&["Alice"]).await;
        let alice = ids[0];

        let toggled = service.set_notifications(alice, None).await.expect("toggle");
        assert_eq!(toggled, Outcome::Notifications(false));
        let toggled = service.set_notifications(alice, None).await.expect("toggle");
        assert_eq!(toggled, Outcome::Notifications(true));
        assert_eq!(
            service.set_notifications(alice, Some(true)).await.expect("set"),
            Outcome::Notifications(true)
        );
    }

    #[test]
    fn rejection_messages() {
        assert_eq!(Rejection::NoSuchRequest.to_string(), "no such request");
        assert_eq!(Rejection::BlockedByTarget.to_string(), "target has blocked you");
    }
}
