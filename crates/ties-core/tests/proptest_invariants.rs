use proptest::prelude::*;

mod support;

use support::{BACKENDS, Backend, Harness};
use ties_core::{
    MutationOutcome, PairEdges, Permission, RelationshipGraph, TiesError, UserId,
    VisibilityPolicy,
};

const USERS: [&str; 3] = ["ann", "ben", "cat"];

#[derive(Debug, Clone, Copy)]
enum Op {
    Follow,
    Unfollow,
    Block,
    Unblock,
    Message,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Follow),
        1 => Just(Op::Unfollow),
        1 => Just(Op::Block),
        1 => Just(Op::Unblock),
        2 => Just(Op::Message),
    ]
}

fn arb_step() -> impl Strategy<Value = (Op, usize, usize)> {
    (arb_op(), 0..USERS.len(), 0..USERS.len())
}

fn apply(h: &Harness, op: Op, actor: &UserId, target: &UserId) -> Result<bool, TiesError> {
    match op {
        Op::Follow => h.service.request_follow(actor, target).map(|o| o.is_applied()),
        Op::Unfollow => h.service.request_unfollow(actor, target).map(|o| o.is_applied()),
        Op::Block => h.service.request_block(actor, target).map(|o| o.is_applied()),
        Op::Unblock => h.service.request_unblock(actor, target).map(|o| o.is_applied()),
        Op::Message => h
            .service
            .get_or_create_conversation(actor, target)
            .map(|grant| grant.created),
    }
}

/// Every ordered pair's edges, for state comparison.
fn graph_state(h: &Harness, users: &[UserId]) -> Vec<PairEdges> {
    let mut state = Vec::new();
    for a in users {
        for b in users {
            if a != b {
                state.push(h.store.edges(a, b).unwrap());
            }
        }
    }
    state
}

fn check_invariants(h: &Harness, users: &[UserId]) -> Result<(), TestCaseError> {
    for a in users {
        for b in users {
            if a == b {
                prop_assert!(h.service.evaluate(a, b).unwrap().is_empty());
                continue;
            }

            let snap = h.service.snapshot(a, b).unwrap();
            let perms = h.service.evaluate(a, b).unwrap();

            prop_assert!(!snap.edges.is_torn(), "{a}->{b}: {:?}", snap.edges);

            let may_start = !snap.any_block() && snap.mutual_follow() && !snap.has_conversation();
            prop_assert_eq!(perms.contains(Permission::CanSendNewMessage), may_start);

            if snap.has_conversation() && !snap.any_block() {
                prop_assert!(perms.contains(Permission::CanContinueExistingConversation));
            }
            if snap.any_block() {
                prop_assert!(!perms.allows_messaging());
                prop_assert!(!perms.contains(Permission::CanFollow));
            }
            if !snap.any_block() {
                prop_assert!(
                    perms.contains(Permission::CanFollow) != perms.contains(Permission::CanUnfollow)
                );
            }
        }
    }
    Ok(())
}

fn run_sequence(backend: Backend, steps: &[(Op, usize, usize)]) -> Result<(), TestCaseError> {
    let h = Harness::new(backend, VisibilityPolicy::Followers);
    let users: Vec<UserId> = USERS.iter().map(|name| h.user(name)).collect();

    for &(op, actor, target) in steps {
        let (actor, target) = (&users[actor], &users[target]);
        match apply(&h, op, actor, target) {
            Ok(_)
            | Err(
                TiesError::InvalidOperation { .. }
                | TiesError::Blocked { .. }
                | TiesError::NotPermitted { .. },
            ) => {}
            Err(other) => prop_assert!(false, "{op:?} {actor}->{target}: {other}"),
        }
        check_invariants(&h, &users)?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_sequences_keep_invariants(steps in prop::collection::vec(arb_step(), 1..40)) {
        for backend in BACKENDS {
            run_sequence(backend, &steps)?;
        }
    }

    #[test]
    fn repeating_a_mutation_changes_nothing(
        prefix in prop::collection::vec(arb_step(), 0..20),
        step in arb_step(),
    ) {
        let (op, actor, target) = step;
        prop_assume!(actor != target);
        prop_assume!(!matches!(op, Op::Message));

        for backend in BACKENDS {
            let h = Harness::new(backend, VisibilityPolicy::Public);
            let users: Vec<UserId> = USERS.iter().map(|name| h.user(name)).collect();
            for &(op, a, b) in &prefix {
                let _ = apply(&h, op, &users[a], &users[b]);
            }

            let (actor, target) = (&users[actor], &users[target]);
            let first = apply(&h, op, actor, target);
            let after_first = graph_state(&h, &users);
            h.sink.drain();

            let second = apply(&h, op, actor, target);
            prop_assert_eq!(graph_state(&h, &users), after_first);
            prop_assert!(h.sink.events().is_empty(), "second {op:?} published events");
            match (first, second) {
                (Ok(_), Ok(applied)) => prop_assert!(!applied),
                (Err(_), Err(_)) => {}
                (first, second) => prop_assert!(false, "{first:?} then {second:?}"),
            }
        }
    }
}

#[test]
fn block_clears_follows_and_messaging_even_with_conversation() {
    for backend in BACKENDS {
        let h = Harness::new(backend, VisibilityPolicy::Public);
        let a = h.user("ann");
        let b = h.user("ben");
        h.service.request_follow(&a, &b).unwrap();
        h.service.request_follow(&b, &a).unwrap();
        h.service.get_or_create_conversation(&a, &b).unwrap();

        h.service.request_block(&b, &a).unwrap();

        assert!(!h.store.is_following(&a, &b).unwrap());
        assert!(!h.store.is_following(&b, &a).unwrap());
        for (x, y) in [(&a, &b), (&b, &a)] {
            let perms = h.service.evaluate(x, y).unwrap();
            assert!(!perms.contains(Permission::CanSendNewMessage));
            assert!(!perms.contains(Permission::CanContinueExistingConversation));
        }
    }
}

#[test]
fn follow_twice_matches_follow_once() {
    for backend in BACKENDS {
        let h = Harness::new(backend, VisibilityPolicy::Public);
        let a = h.user("ann");
        let b = h.user("ben");

        assert!(h.service.request_follow(&a, &b).unwrap().is_applied());
        let once = h.store.edges(&a, &b).unwrap();
        assert_eq!(
            h.service.request_follow(&a, &b).unwrap(),
            MutationOutcome::Unchanged
        );
        assert_eq!(h.store.edges(&a, &b).unwrap(), once);
        assert_eq!(h.store.followers(&b).unwrap(), vec![a.clone()]);
    }
}
