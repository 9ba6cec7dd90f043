//! Lottery state machine over an injected document store.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::persist::DocumentStore;

/// Winner notification dispatch and inbox.
pub mod dispatch;
/// Per-event serialization primitive.
pub mod locks;
/// Winner selection.
pub mod lottery;
/// Applicant registry.
pub mod registry;

use dispatch::{NotificationDispatcher, NotificationTemplate};
use locks::EventLocks;
use lottery::LotterySelector;
use registry::EntrantRegistry;

/// The three stateful components sharing one store and one lock table.
pub struct LotteryCore {
    /// Events, applications, invitation answers, and organizer cancellations.
    pub registry: EntrantRegistry,
    /// Winner draws.
    pub selector: LotterySelector,
    /// Draw notices, group messages, and the inbox.
    pub dispatcher: NotificationDispatcher,
}

impl LotteryCore {
    /// Core over `store` with the default notice wording.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_template(store, NotificationTemplate::default())
    }

    /// Core over `store` sending notices worded by `template`.
    pub fn with_template(store: Arc<dyn DocumentStore>, template: NotificationTemplate) -> Self {
        let locks = Arc::new(EventLocks::new());
        Self {
            registry: EntrantRegistry::new(Arc::clone(&store), Arc::clone(&locks), template.clone()),
            selector: LotterySelector::new(Arc::clone(&store), Arc::clone(&locks)),
            dispatcher: NotificationDispatcher::new(store, locks, template),
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
