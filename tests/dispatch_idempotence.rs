use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use entrant_lottery::{
    batch::WriteBatch,
    core::LotteryCore,
    error::LotteryError,
    event::EventDraft,
    persist::{
        Collection, Document, DocumentStore, Filter, PersistError, PersistResult, memory::MemoryStore,
    },
    types::{InvitationStatus, MembershipStatus},
};

/// Delegates to a [`MemoryStore`] but can be told to reject commits.
struct FlakyStore {
    inner: MemoryStore,
    fail_commits: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_commits: AtomicBool::new(false),
        }
    }
}

impl DocumentStore for FlakyStore {
    fn get(&self, collection: Collection, id: &str) -> PersistResult<Option<Document>> {
        self.inner.get(collection, id)
    }

    fn query(&self, collection: Collection, filters: &[Filter]) -> PersistResult<Vec<Document>> {
        self.inner.query(collection, filters)
    }

    fn commit(&self, batch: WriteBatch) -> PersistResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(PersistError::Message("store unavailable".to_string()));
        }
        self.inner.commit(batch)
    }
}

fn drawn_event(core: &LotteryCore, applicants: usize, winners: i64) -> String {
    let event = core
        .registry
        .create_event(EventDraft::titled("Summer Camp"))
        .expect("create");
    for i in 0..applicants {
        core.registry
            .apply(&event.id, &format!("kid-{i}"))
            .expect("apply");
    }
    core.selector.select_winners(&event.id, winners).expect("draw");
    event.id
}

#[test]
fn second_dispatch_sends_nothing() {
    let store = Arc::new(MemoryStore::new());
    let core = LotteryCore::new(store.clone());
    let event_id = drawn_event(&core, 6, 3);

    let first = core
        .dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect("first dispatch");
    let second = core
        .dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect("second dispatch");

    assert_eq!(first.count(), 3);
    assert_eq!(second.count(), 0);
    assert_eq!(store.len(Collection::Notifications), 3);

    let event = core.registry.event(&event_id).expect("event");
    for user in &first.notified {
        assert_eq!(core.dispatcher.notifications_for(user, false).expect("inbox").len(), 1);
        assert_eq!(event.invitation_status.get(user), Some(&InvitationStatus::Pending));

        let membership = store.entrant(&event_id, user).expect("read").expect("membership");
        assert!(membership.winner_notified);
        assert_eq!(membership.status, MembershipStatus::Notified);
    }
}

#[test]
fn later_winners_are_notified_without_repeating_earlier_ones() {
    let store = Arc::new(MemoryStore::new());
    let core = LotteryCore::new(store.clone());
    let event_id = drawn_event(&core, 5, 2);

    core.dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect("first dispatch");
    core.selector.select_winners(&event_id, 2).expect("second draw");
    let report = core
        .dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect("second dispatch");

    assert_eq!(report.count(), 2);
    assert_eq!(store.len(Collection::Notifications), 4);
}

#[test]
fn nothing_chosen_means_nothing_sent() {
    let store = Arc::new(MemoryStore::new());
    let core = LotteryCore::new(store.clone());
    let event_id = drawn_event(&core, 4, 0);

    let report = core
        .dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect("dispatch");

    assert_eq!(report.count(), 0);
    assert_eq!(store.len(Collection::Notifications), 0);
}

#[test]
fn failed_commit_leaves_no_partial_state() {
    let store = Arc::new(FlakyStore::new());
    let core = LotteryCore::new(store.clone());
    let event_id = drawn_event(&core, 4, 2);

    store.fail_commits.store(true, Ordering::SeqCst);
    let err = core
        .dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect_err("commit rejected");
    assert!(matches!(err, LotteryError::Dispatch { .. }));
    assert!(err.is_retryable());

    assert_eq!(store.inner.len(Collection::Notifications), 0);
    let event = core.registry.event(&event_id).expect("event");
    assert!(event.invitation_status.is_empty());
    let unnotified = store
        .entrants(&[
            Filter::eq("eventId", event_id.as_str()),
            Filter::eq("winnerNotified", false),
        ])
        .expect("entrants");
    assert_eq!(unnotified.len(), 4);

    store.fail_commits.store(false, Ordering::SeqCst);
    let retry = core
        .dispatcher
        .dispatch_winner_notifications(&event_id)
        .expect("retry");
    assert_eq!(retry.count(), 2);
}

#[test]
fn inbox_marks_single_and_all_notifications_read() {
    let core = LotteryCore::new(Arc::new(MemoryStore::new()));
    let first = drawn_event(&core, 1, 1);
    let second = drawn_event(&core, 1, 1);
    core.dispatcher.dispatch_winner_notifications(&first).expect("dispatch first");
    core.dispatcher.dispatch_winner_notifications(&second).expect("dispatch second");

    let inbox = core.dispatcher.notifications_for("kid-0", false).expect("inbox");
    assert_eq!(inbox.len(), 2);
    assert!(inbox[0].created_at >= inbox[1].created_at);
    assert!(inbox[0].message.contains("Summer Camp"));

    core.dispatcher.mark_read(&inbox[0].id).expect("mark read");
    assert_eq!(core.dispatcher.notifications_for("kid-0", true).expect("unread").len(), 1);

    assert_eq!(core.dispatcher.mark_all_read("kid-0").expect("mark all"), 1);
    assert_eq!(core.dispatcher.mark_all_read("kid-0").expect("mark all again"), 0);
    assert!(matches!(
        core.dispatcher.mark_read("no-such-notification"),
        Err(LotteryError::NotificationNotFound(_))
    ));
}
