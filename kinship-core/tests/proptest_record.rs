//! Property-based tests for `SocialRecord` invariants.
//!
//! Random operation sequences over a small pool of players, checked after
//! every step.

use proptest::prelude::*;

use kinship_core::{InboundEdges, PlayerId, SocialRecord};

const POOL: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Send(usize),
    Receive(usize),
    Cancel(usize),
    Accept(usize),
    Deny(usize),
    AddFriend(usize),
    RemoveFriend(usize),
    AddBest(usize),
    RemoveBest(usize),
    Block(usize),
    Unblock(usize),
    Ignore(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    (0u8..12, 0..POOL).prop_map(|(kind, i)| match kind {
        0 => Op::Send(i),
        1 => Op::Receive(i),
        2 => Op::Cancel(i),
        3 => Op::Accept(i),
        4 => Op::Deny(i),
        5 => Op::AddFriend(i),
        6 => Op::RemoveFriend(i),
        7 => Op::AddBest(i),
        8 => Op::RemoveBest(i),
        9 => Op::Block(i),
        10 => Op::Unblock(i),
        _ => Op::Ignore(i),
    })
}

fn players() -> Vec<PlayerId> {
    (0..POOL).map(|_| PlayerId::new()).collect()
}

fn apply(record: &mut SocialRecord, ids: &[PlayerId], op: &Op) {
    match *op {
        Op::Send(i) => record.send_request(ids[i]),
        Op::Receive(i) => record.receive_request(ids[i]),
        Op::Cancel(i) => record.cancel_request(ids[i]),
        Op::Accept(i) => {
            record.accept_request(ids[i]);
        }
        Op::Deny(i) => {
            record.deny_request(ids[i]);
        }
        Op::AddFriend(i) => record.add_friend(ids[i]),
        Op::RemoveFriend(i) => record.remove_friend(ids[i]),
        Op::AddBest(i) => {
            record.add_best_friend(ids[i]);
        }
        Op::RemoveBest(i) => record.remove_best_friend(ids[i]),
        Op::Block(i) => record.block_player(ids[i]),
        Op::Unblock(i) => record.unblock_player(ids[i]),
        Op::Ignore(i) => record.ignore_player(ids[i]),
    }
}

// ---------------------------------------------------------------------------
// Property: best friends are always friends
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn best_friends_subset_of_friends(ops in prop::collection::vec(arb_op(), 0..60)) {
        let ids = players();
        let mut record = SocialRecord::new(PlayerId::new(), "owner");
        for op in &ops {
            apply(&mut record, &ids, op);
            prop_assert!(record.best_friends().is_subset(record.friends()));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: a friend is never also a pending request
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn friends_and_requests_are_disjoint(ops in prop::collection::vec(arb_op(), 0..60)) {
        let ids = players();
        let mut record = SocialRecord::new(PlayerId::new(), "owner");
        for op in &ops {
            apply(&mut record, &ids, op);
            prop_assert!(record.friends().is_disjoint(record.outgoing_requests()));
            prop_assert!(record.friends().is_disjoint(record.incoming_requests()));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: block clears every relationship with the target
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn block_clears_target(
        ops in prop::collection::vec(arb_op(), 0..40),
        target in 0..POOL,
    ) {
        let ids = players();
        let mut record = SocialRecord::new(PlayerId::new(), "owner");
        for op in &ops {
            apply(&mut record, &ids, op);
        }

        let target = ids[target];
        record.block_player(target);

        prop_assert!(!record.friends().contains(&target));
        prop_assert!(!record.best_friends().contains(&target));
        prop_assert!(!record.incoming_requests().contains(&target));
        prop_assert!(!record.outgoing_requests().contains(&target));
        prop_assert!(record.blocked().contains(&target));
    }
}

// ---------------------------------------------------------------------------
// Property: repeated requests are absorbed by set semantics
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn send_request_is_idempotent(times in 1usize..10) {
        let target = PlayerId::new();
        let mut record = SocialRecord::new(PlayerId::new(), "owner");
        for _ in 0..times {
            record.send_request(target);
        }
        prop_assert_eq!(record.outgoing_requests().len(), 1);
        prop_assert!(record.has_sent_request_to(target));
    }
}

// ---------------------------------------------------------------------------
// Property: reconciliation keeps the invariants and is stable
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn reconcile_preserves_invariants_and_settles(
        ops in prop::collection::vec(arb_op(), 0..40),
        befriended in prop::collection::vec(any::<bool>(), POOL),
        requested in prop::collection::vec(any::<bool>(), POOL),
    ) {
        let ids = players();
        let mut record = SocialRecord::new(PlayerId::new(), "owner");
        for op in &ops {
            apply(&mut record, &ids, op);
        }

        let pick = |flags: &[bool]| {
            ids.iter().zip(flags).filter(|(_, on)| **on).map(|(id, _)| *id).collect()
        };
        let inbound = InboundEdges {
            befriended_by: pick(&befriended),
            requested_by: pick(&requested),
        };

        record.reconcile(&inbound);
        prop_assert!(record.best_friends().is_subset(record.friends()));
        prop_assert!(record.friends().is_disjoint(record.outgoing_requests()));
        for friend in record.friends() {
            prop_assert!(
                inbound.befriended_by.contains(friend) || inbound.requested_by.contains(friend)
            );
        }

        let second = record.reconcile(&inbound);
        prop_assert!(second.is_empty());
    }
}
