use std::collections::BTreeSet;
use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};

use entrant_lottery::{
    core::LotteryCore,
    error::LotteryError,
    event::EventDraft,
    persist::{DocumentStore, memory::MemoryStore},
    types::MembershipStatus,
};

fn event_with_waitlist(core: &LotteryCore, capacity: Option<u32>, applicants: usize) -> String {
    let event = core
        .registry
        .create_event(EventDraft {
            capacity,
            ..EventDraft::titled("Draw Night")
        })
        .expect("create");
    for i in 0..applicants {
        core.registry
            .apply(&event.id, &format!("user-{i:02}"))
            .expect("apply");
    }
    event.id
}

#[test]
fn count_at_least_waitlist_takes_everyone() {
    let core = LotteryCore::new(Arc::new(MemoryStore::new()));
    let event_id = event_with_waitlist(&core, None, 5);

    let winners = core.selector.select_winners(&event_id, 9).expect("draw");

    assert_eq!(winners.len(), 5);
    let event = core.registry.event(&event_id).expect("event");
    assert!(event.waitlist_user_ids.is_empty());
    assert_eq!(event.chosen_user_ids.len(), 5);
}

#[test]
fn partial_draw_is_distinct_and_conserves_entrants() {
    let store = Arc::new(MemoryStore::new());
    let core = LotteryCore::new(store.clone());
    let event_id = event_with_waitlist(&core, None, 10);
    let before = core.registry.event(&event_id).expect("event");

    let winners = core
        .selector
        .select_winners_with(&event_id, 4, &mut StdRng::seed_from_u64(7))
        .expect("draw");

    let distinct: BTreeSet<&String> = winners.iter().collect();
    assert_eq!(distinct.len(), 4);

    let after = core.registry.event(&event_id).expect("event");
    for winner in &winners {
        assert!(before.waitlist_user_ids.contains(winner));
        assert!(!after.waitlist_user_ids.contains(winner));
        assert!(after.chosen_user_ids.contains(winner));

        let membership = store.entrant(&event_id, winner).expect("read").expect("membership");
        assert_eq!(membership.status, MembershipStatus::Chosen);
        assert!(!membership.winner_notified);
    }
    assert_eq!(
        after.waitlist_user_ids.len() + after.chosen_user_ids.len(),
        before.waitlist_user_ids.len()
    );
}

#[test]
fn seeded_generator_reproduces_the_draw() {
    let first = LotteryCore::new(Arc::new(MemoryStore::new()));
    let second = LotteryCore::new(Arc::new(MemoryStore::new()));
    let a = event_with_waitlist(&first, None, 20);
    let b = event_with_waitlist(&second, None, 20);

    let draw_a = first
        .selector
        .select_winners_with(&a, 6, &mut StdRng::seed_from_u64(42))
        .expect("draw a");
    let draw_b = second
        .selector
        .select_winners_with(&b, 6, &mut StdRng::seed_from_u64(42))
        .expect("draw b");

    assert_eq!(draw_a, draw_b);
}

#[test]
fn zero_count_and_empty_waitlist_are_empty_draws() {
    let core = LotteryCore::new(Arc::new(MemoryStore::new()));
    let populated = event_with_waitlist(&core, None, 3);
    let empty = event_with_waitlist(&core, None, 0);

    assert!(core.selector.select_winners(&populated, 0).expect("zero").is_empty());
    assert!(core.selector.select_winners(&empty, 5).expect("empty").is_empty());
    assert_eq!(core.registry.counts(&populated).expect("counts").waitlisted, 3);
}

#[test]
fn negative_count_is_rejected_without_changes() {
    let core = LotteryCore::new(Arc::new(MemoryStore::new()));
    let event_id = event_with_waitlist(&core, None, 3);

    assert!(matches!(
        core.selector.select_winners(&event_id, -1),
        Err(LotteryError::Validation(_))
    ));
    assert_eq!(core.registry.counts(&event_id).expect("counts").waitlisted, 3);
}

#[test]
fn missing_event_is_not_found() {
    let core = LotteryCore::new(Arc::new(MemoryStore::new()));
    assert!(matches!(
        core.selector.select_winners("nope", 2),
        Err(LotteryError::EventNotFound(_))
    ));
}

#[test]
fn capacity_clamps_the_draw_then_rejects_when_full() {
    let core = LotteryCore::new(Arc::new(MemoryStore::new()));
    let event_id = event_with_waitlist(&core, Some(3), 8);

    let winners = core.selector.select_winners(&event_id, 5).expect("draw");
    assert_eq!(winners.len(), 3);

    let before = core.registry.event(&event_id).expect("event");
    let err = core.selector.select_winners(&event_id, 1).expect_err("full");
    assert!(matches!(
        err,
        LotteryError::CapacityExceeded { capacity: 3, .. }
    ));
    assert_eq!(core.registry.event(&event_id).expect("event"), before);
}
