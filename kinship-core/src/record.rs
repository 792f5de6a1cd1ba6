//! The per-player social record.
//!
//! A [`SocialRecord`] holds everything one player knows about their
//! relationships: friends, best friends, blocked and ignored players, pending
//! requests in both directions, and the join/leave notification toggle. It
//! performs no I/O. Every mutation goes through a named operation so the
//! single-record invariants always hold:
//!
//! - `best_friends ⊆ friends`
//! - a player is never both a friend and a pending request (either direction)
//! - a blocked player is never a friend, best friend, or pending request
//!
//! Symmetry between two records (B in A's friends iff A in B's friends) is
//! not something one record can guarantee; see [`crate::protocol`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::PlayerId;

/// Relationship state of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialRecord {
    player_id: PlayerId,
    display_name: String,
    friends: HashSet<PlayerId>,
    best_friends: HashSet<PlayerId>,
    ignored: HashSet<PlayerId>,
    blocked: HashSet<PlayerId>,
    outgoing_requests: HashSet<PlayerId>,
    incoming_requests: HashSet<PlayerId>,
    notifications_enabled: bool,
}

impl SocialRecord {
    /// Create an empty record with notifications enabled.
    #[must_use]
    pub fn new(player_id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            player_id,
            display_name: display_name.into(),
            friends: HashSet::new(),
            best_friends: HashSet::new(),
            ignored: HashSet::new(),
            blocked: HashSet::new(),
            outgoing_requests: HashSet::new(),
            incoming_requests: HashSet::new(),
            notifications_enabled: true,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The owner's stable identity.
    #[must_use]
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// The owner's most recently seen display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Record a rename; identity is unaffected.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    /// Mutual friends.
    #[must_use]
    pub fn friends(&self) -> &HashSet<PlayerId> {
        &self.friends
    }

    /// Friends flagged as best friends.
    #[must_use]
    pub fn best_friends(&self) -> &HashSet<PlayerId> {
        &self.best_friends
    }

    /// Players whose messages the owner ignores.
    #[must_use]
    pub fn ignored(&self) -> &HashSet<PlayerId> {
        &self.ignored
    }

    /// Players the owner has blocked.
    #[must_use]
    pub fn blocked(&self) -> &HashSet<PlayerId> {
        &self.blocked
    }

    /// Requests the owner sent and that are still pending.
    #[must_use]
    pub fn outgoing_requests(&self) -> &HashSet<PlayerId> {
        &self.outgoing_requests
    }

    /// Requests the owner received and has not answered.
    #[must_use]
    pub fn incoming_requests(&self) -> &HashSet<PlayerId> {
        &self.incoming_requests
    }

    /// Whether friend join/leave notices are delivered to the owner.
    #[must_use]
    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// Turn friend join/leave notices on or off.
    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
    }

    // ------------------------------------------------------------------
    // Friend requests
    // ------------------------------------------------------------------

    /// Note an outgoing request to `target`. Pair with the target's
    /// [`Self::receive_request`]. Adding twice is a no-op, and so is
    /// requesting someone who is already a friend.
    pub fn send_request(&mut self, target: PlayerId) {
        if !self.friends.contains(&target) {
            self.outgoing_requests.insert(target);
        }
    }

    /// Note an incoming request from `sender`. Same set semantics as
    /// [`Self::send_request`].
    pub fn receive_request(&mut self, sender: PlayerId) {
        if !self.friends.contains(&sender) {
            self.incoming_requests.insert(sender);
        }
    }

    /// Withdraw the outgoing request to `target`, if any.
    pub fn cancel_request(&mut self, target: PlayerId) {
        self.outgoing_requests.remove(&target);
    }

    /// Accept the pending request from `sender`, making them a friend.
    ///
    /// Returns `false` (and changes nothing) if there was no such request.
    /// Only this record is touched; the sender's record needs its own
    /// `cancel_request` + `add_friend`.
    pub fn accept_request(&mut self, sender: PlayerId) -> bool {
        if self.incoming_requests.remove(&sender) {
            self.add_friend(sender);
            true
        } else {
            false
        }
    }

    /// Drop the pending request from `sender`. Returns whether one existed.
    pub fn deny_request(&mut self, sender: PlayerId) -> bool {
        self.incoming_requests.remove(&sender)
    }

    /// Is there an unanswered request from `sender`?
    #[must_use]
    pub fn has_pending_request_from(&self, sender: PlayerId) -> bool {
        self.incoming_requests.contains(&sender)
    }

    /// Is our request to `target` still pending?
    #[must_use]
    pub fn has_sent_request_to(&self, target: PlayerId) -> bool {
        self.outgoing_requests.contains(&target)
    }

    // ------------------------------------------------------------------
    // Friends
    // ------------------------------------------------------------------

    /// Add `friend` directly. Any request pending between the two, in either
    /// direction, is settled by this and removed.
    pub fn add_friend(&mut self, friend: PlayerId) {
        self.friends.insert(friend);
        self.outgoing_requests.remove(&friend);
        self.incoming_requests.remove(&friend);
    }

    /// Remove `friend`, including their best-friend flag.
    pub fn remove_friend(&mut self, friend: PlayerId) {
        self.friends.remove(&friend);
        self.best_friends.remove(&friend);
    }

    /// Is `other` a friend?
    #[must_use]
    pub fn is_friend(&self, other: PlayerId) -> bool {
        self.friends.contains(&other)
    }

    /// Flag an existing friend as best friend. Returns `false` if `friend`
    /// is not a friend.
    pub fn add_best_friend(&mut self, friend: PlayerId) -> bool {
        if self.friends.contains(&friend) {
            self.best_friends.insert(friend);
            true
        } else {
            false
        }
    }

    /// Clear the best-friend flag; the friendship itself stays.
    pub fn remove_best_friend(&mut self, friend: PlayerId) {
        self.best_friends.remove(&friend);
    }

    /// Is `friend` flagged as best friend?
    #[must_use]
    pub fn is_best_friend(&self, friend: PlayerId) -> bool {
        self.best_friends.contains(&friend)
    }

    // ------------------------------------------------------------------
    // Ignore / block
    // ------------------------------------------------------------------

    /// Ignore `target`. Has no effect on other relationships.
    pub fn ignore_player(&mut self, target: PlayerId) {
        self.ignored.insert(target);
    }

    /// Stop ignoring `target`.
    pub fn unignore_player(&mut self, target: PlayerId) {
        self.ignored.remove(&target);
    }

    /// Is `target` ignored?
    #[must_use]
    pub fn has_ignored(&self, target: PlayerId) -> bool {
        self.ignored.contains(&target)
    }

    /// Block `target`: they stop being a friend or best friend, and pending
    /// requests in both directions are dropped.
    pub fn block_player(&mut self, target: PlayerId) {
        self.blocked.insert(target);
        self.remove_friend(target);
        self.incoming_requests.remove(&target);
        self.outgoing_requests.remove(&target);
    }

    /// Unblock `target`. Relationships dropped by the block are not restored.
    pub fn unblock_player(&mut self, target: PlayerId) {
        self.blocked.remove(&target);
    }

    /// Has the owner blocked `target`?
    #[must_use]
    pub fn has_blocked(&self, target: PlayerId) -> bool {
        self.blocked.contains(&target)
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Bring a freshly loaded record in line with what other players' records
    /// say about the owner.
    ///
    /// While a player is offline the protocol can only update the online
    /// side of a relationship. This replays what happened in the meantime:
    /// requests the other side accepted become friendships, and friends who
    /// dropped their edge to us (removed or blocked us) are removed.
    pub fn reconcile(&mut self, inbound: &InboundEdges) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let accepted: Vec<PlayerId> = self
            .outgoing_requests
            .iter()
            .filter(|target| inbound.befriended_by.contains(target))
            .copied()
            .collect();
        for target in accepted {
            self.add_friend(target);
            report.accepted_while_away.push(target);
        }

        let dropped: Vec<PlayerId> = self
            .friends
            .iter()
            .filter(|friend| {
                !inbound.befriended_by.contains(friend) && !inbound.requested_by.contains(friend)
            })
            .copied()
            .collect();
        for friend in dropped {
            self.remove_friend(friend);
            report.removed_while_away.push(friend);
        }

        report
    }
}

/// Edges other records hold toward one player, as seen by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEdges {
    /// Players whose friend list contains the owner.
    pub befriended_by: HashSet<PlayerId>,
    /// Players with a stored outgoing request to the owner.
    pub requested_by: HashSet<PlayerId>,
}

/// What [`SocialRecord::reconcile`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Outgoing requests that were accepted while the owner was away.
    pub accepted_while_away: Vec<PlayerId>,
    /// Friends that dropped the owner while the owner was away.
    pub removed_while_away: Vec<PlayerId>,
}

impl ReconcileReport {
    /// `true` if reconciliation left the record untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted_while_away.is_empty() && self.removed_while_away.is_empty()
    }
}
