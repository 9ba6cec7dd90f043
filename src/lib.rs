//! Entrant lifecycle, lottery draws, and exactly-once winner notifications
//! over a transactional document store.
//!
//! # Examples
//!
//! Synchronous usage with [`persist::memory::MemoryStore`]:
//! ```
//! use std::sync::Arc;
//!
//! use entrant_lottery::{
//!     core::LotteryCore,
//!     event::EventDraft,
//!     persist::memory::MemoryStore,
//!     types::EntrantStatus,
//! };
//!
//! let core = LotteryCore::new(Arc::new(MemoryStore::new()));
//! let event = core.registry.create_event(EventDraft::titled("Jazz Night")).expect("create");
//! core.registry.apply(&event.id, "alice").expect("apply");
//! assert_eq!(core.registry.status_of(&event.id, "alice"), EntrantStatus::Waitlisted);
//!
//! let winners = core.selector.select_winners(&event.id, 1).expect("draw");
//! assert_eq!(winners, vec!["alice".to_string()]);
//!
//! let report = core.dispatcher.dispatch_winner_notifications(&event.id).expect("dispatch");
//! assert_eq!(report.count(), 1);
//! ```
//!
//! Runtime usage with SQLite store:
//! ```no_run
//! use std::sync::Arc;
//!
//! use entrant_lottery::{
//!     core::LotteryCore,
//!     event::EventDraft,
//!     persist::sqlite::SqliteStore,
//!     runtime::handle::{spawn_lottery, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteStore::open("lottery.db").expect("open sqlite");
//! let core = LotteryCore::new(Arc::new(store));
//! let event = core.registry.create_event(EventDraft::titled("Jazz Night")).expect("create");
//! let handle = spawn_lottery(core, RuntimeConfig::default());
//! handle.apply(&event.id, "alice").await.expect("apply");
//! handle.select_winners(&event.id, 10).await.expect("draw");
//! handle.dispatch_winner_notifications(&event.id).await.expect("dispatch");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Atomic write batches and persisted envelopes.
pub mod batch;
/// Registry, lottery, and dispatcher over an injected store.
pub mod core;
/// Error taxonomy.
pub mod error;
/// Event, membership, and notification documents.
pub mod event;
/// Document store abstraction with in-memory and SQLite implementations.
pub mod persist;
/// Per-event single-writer runtime and events.
pub mod runtime;
/// Shared identifiers and lifecycle enums.
pub mod types;
/// Pure search and status helpers.
pub mod view;
