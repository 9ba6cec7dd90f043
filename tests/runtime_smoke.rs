use std::{sync::Arc, time::Duration};

use entrant_lottery::{
    core::{LotteryCore, registry::ApplyOutcome},
    error::LotteryError,
    event::{EntrantSet, EventDraft},
    persist::{Collection, memory::MemoryStore},
    runtime::{
        events::LotteryEvent,
        handle::{RuntimeConfig, RuntimeError, spawn_lottery},
    },
    types::{EntrantStatus, InvitationResponse},
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn core_with_event(title: &str) -> (Arc<MemoryStore>, LotteryCore, String) {
    let store = Arc::new(MemoryStore::new());
    let core = LotteryCore::new(store.clone());
    let event = core
        .registry
        .create_event(EventDraft::titled(title))
        .expect("create");
    (store, core, event.id)
}

#[tokio::test]
async fn runtime_apply_draw_dispatch_and_events_ordered() {
    init_tracing();
    let (_store, core, event_id) = core_with_event("Board Games");
    let handle = spawn_lottery(core, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    assert_eq!(
        handle.apply(&event_id, "alice").await.expect("apply"),
        ApplyOutcome::Applied
    );
    assert_eq!(
        handle.apply(&event_id, "alice").await.expect("apply again"),
        ApplyOutcome::AlreadyApplied
    );
    let winners = handle.select_winners(&event_id, 1).await.expect("draw");
    let report = handle
        .dispatch_winner_notifications(&event_id)
        .await
        .expect("dispatch");
    let status = handle
        .respond(&event_id, "alice", InvitationResponse::Accepted)
        .await
        .expect("respond");

    assert_eq!(winners, vec!["alice".to_string()]);
    assert_eq!(report.count(), 1);
    assert_eq!(status, EntrantStatus::Enrolled);
    assert_eq!(
        handle.status_of(&event_id, "alice").await.expect("status"),
        EntrantStatus::Enrolled
    );

    let mut seen = Vec::new();
    for _ in 0..4 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        seen.push(evt);
    }

    assert_eq!(
        seen[0],
        LotteryEvent::Applied {
            event_id: event_id.clone(),
            user_id: "alice".to_string(),
        }
    );
    assert!(matches!(seen[1], LotteryEvent::WinnersSelected { .. }));
    assert!(matches!(seen[2], LotteryEvent::WinnersNotified { .. }));
    assert!(matches!(
        seen[3],
        LotteryEvent::InvitationAnswered {
            response: InvitationResponse::Accepted,
            ..
        }
    ));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_applies_through_handle_are_all_kept() {
    let (_store, core, event_id) = core_with_event("Open Day");
    let handle = spawn_lottery(core, RuntimeConfig::default());

    let mut tasks = Vec::new();
    for i in 0..50 {
        let handle = handle.clone();
        let event_id = event_id.clone();
        tasks.push(tokio::spawn(async move {
            handle.apply(&event_id, format!("user-{i}")).await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("apply");
    }

    let counts = handle.core().registry.counts(&event_id).expect("counts");
    assert_eq!(counts.waitlisted, 50);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn repeated_dispatch_through_handle_notifies_once() {
    let (store, core, event_id) = core_with_event("Lecture");
    let handle = spawn_lottery(core, RuntimeConfig::default());

    for user in ["a", "b", "c"] {
        handle.apply(&event_id, user).await.expect("apply");
    }
    handle.select_winners(&event_id, 2).await.expect("draw");

    let (first, second) = tokio::join!(
        handle.dispatch_winner_notifications(&event_id),
        handle.dispatch_winner_notifications(&event_id)
    );
    let total = first.expect("first").count() + second.expect("second").count();

    assert_eq!(total, 2);
    assert_eq!(store.len(Collection::Notifications), 2);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn errors_surface_and_shutdown_closes_the_handle() {
    init_tracing();
    let (_store, core, event_id) = core_with_event("Quiz");
    let handle = spawn_lottery(core, RuntimeConfig::default());

    let err = handle
        .select_winners("missing", 1)
        .await
        .expect_err("unknown event");
    assert!(matches!(
        err,
        RuntimeError::Lottery(LotteryError::EventNotFound(_))
    ));

    handle.apply(&event_id, "u1").await.expect("apply");
    handle.shutdown().await.expect("shutdown");

    assert!(matches!(
        handle.apply(&event_id, "u2").await,
        Err(RuntimeError::ChannelClosed)
    ));
    assert_eq!(
        handle.core().registry.counts(&event_id).expect("counts").waitlisted,
        1
    );
}

#[tokio::test]
async fn unknown_events_never_start_workers() {
    let (_store, core, event_id) = core_with_event("Film Club");
    let handle = spawn_lottery(core, RuntimeConfig::default());

    handle.apply(&event_id, "alice").await.expect("apply");
    assert_eq!(handle.active_workers(), 1);

    for i in 0..500 {
        let res = handle.apply(&format!("ghost-{i}"), "alice").await;
        assert!(matches!(
            res,
            Err(RuntimeError::Lottery(LotteryError::EventNotFound(_)))
        ));
    }
    assert_eq!(handle.active_workers(), 1);

    handle.shutdown().await.expect("shutdown");
    assert_eq!(handle.active_workers(), 0);
}

#[tokio::test]
async fn idle_workers_retire_and_restart_on_demand() {
    let (_store, core, event_id) = core_with_event("Book Swap");
    let handle = spawn_lottery(
        core,
        RuntimeConfig {
            worker_idle_ms: 20,
            ..RuntimeConfig::default()
        },
    );

    handle.apply(&event_id, "a").await.expect("apply");
    assert_eq!(handle.active_workers(), 1);

    let mut retired = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if handle.active_workers() == 0 {
            retired = true;
            break;
        }
    }
    assert!(retired, "idle worker should leave the table");

    handle.apply(&event_id, "b").await.expect("apply after retire");
    assert_eq!(
        handle.core().registry.counts(&event_id).expect("counts").waitlisted,
        2
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn organizer_commands_run_through_the_handle() {
    let (store, core, event_id) = core_with_event("Hackathon");
    let handle = spawn_lottery(core, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    for user in ["a", "b", "c"] {
        handle.apply(&event_id, user).await.expect("apply");
    }
    let winners = handle.select_winners(&event_id, 1).await.expect("draw");
    let losers = handle
        .dispatch_loser_notifications(&event_id)
        .await
        .expect("draw notices");
    let group = handle
        .notify_group(&event_id, EntrantSet::Waitlist, None, "Second round soon")
        .await
        .expect("group message");
    handle
        .cancel_entrant(&event_id, winners[0].clone())
        .await
        .expect("cancel");

    assert_eq!(losers.count(), 2);
    assert_eq!(group.count(), 2);
    assert_eq!(store.len(Collection::Notifications), 5);
    assert_eq!(
        handle.status_of(&event_id, &winners[0]).await.expect("status"),
        EntrantStatus::Declined
    );

    let mut kinds = Vec::new();
    for _ in 0..7 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        kinds.push(evt);
    }
    assert!(matches!(kinds[4], LotteryEvent::LosersNotified { .. }));
    assert!(matches!(
        kinds[5],
        LotteryEvent::GroupNotified {
            set: EntrantSet::Waitlist,
            ..
        }
    ));
    assert_eq!(
        kinds[6],
        LotteryEvent::EntrantCancelled {
            event_id: event_id.clone(),
            user_id: winners[0].clone(),
        }
    );

    handle.shutdown().await.expect("shutdown");
}
