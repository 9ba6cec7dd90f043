use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;

use crate::types::EventId;

type Slot = Arc<Mutex<()>>;

/// Per-event mutual exclusion for read-modify-commit sequences.
///
/// A slot lives only while some caller holds or waits on it.
#[derive(Debug, Default)]
pub struct EventLocks {
    slots: Mutex<HashMap<EventId, Slot>>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `event_id`.
    pub fn with_event<T>(&self, event_id: &str, f: impl FnOnce() -> T) -> T {
        let slot = self.acquire(event_id);
        let out = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(event_id, slot);
        out
    }

    /// Number of slots currently in use.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn acquire(&self, event_id: &str) -> Slot {
        let mut slots = self.slots();
        if let Some(slot) = slots.get(event_id) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(Mutex::new(()));
        slots.insert(event_id.to_string(), Arc::clone(&slot));
        slot
    }

    // Clones are only handed out under the table lock, so a count of two
    // (table + ours) means nobody else is holding or waiting.
    fn release(&self, event_id: &str, slot: Slot) {
        let mut slots = self.slots();
        let unused = slots
            .get(event_id)
            .is_some_and(|held| Arc::ptr_eq(held, &slot) && Arc::strong_count(&slot) == 2);
        if unused {
            slots.remove(event_id);
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<EventId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::EventLocks;

    #[test]
    fn slots_are_dropped_after_use() {
        let locks = EventLocks::new();
        for i in 0..100 {
            let seen = locks.with_event(&format!("event-{i}"), || locks.len());
            assert_eq!(seen, 1);
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn contended_slot_survives_until_last_user() {
        let locks = Arc::new(EventLocks::new());
        let mut total = 0u32;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let locks = Arc::clone(&locks);
                    scope.spawn(move || locks.with_event("shared", || 1u32))
                })
                .collect();
            for handle in handles {
                total += handle.join().expect("join");
            }
        });
        assert_eq!(total, 8);
        assert!(locks.is_empty());
    }
}
