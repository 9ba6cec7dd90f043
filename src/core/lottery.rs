use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::{
    batch::WriteBatch,
    error::{LotteryError, LotteryResult},
    event::{EntrantRecord, EventRecord},
    persist::{Document, DocumentStore, Filter},
    types::{MembershipStatus, UserId},
};

use super::{locks::EventLocks, now_ms};

/// Draws winners from an event's waitlist.
pub struct LotterySelector {
    store: Arc<dyn DocumentStore>,
    locks: Arc<EventLocks>,
}

impl LotterySelector {
    pub fn new(store: Arc<dyn DocumentStore>, locks: Arc<EventLocks>) -> Self {
        Self { store, locks }
    }

    /// Draws up to `count` winners using the thread-local CSPRNG.
    pub fn select_winners(&self, event_id: &str, count: i64) -> LotteryResult<Vec<UserId>> {
        self.select_winners_with(event_id, count, &mut rand::thread_rng())
    }

    /// Draws up to `count` winners using `rng`.
    ///
    /// The pool is the waitlist in sorted order, so a seeded `rng` reproduces
    /// the same draw for the same waitlist. The draw is clamped to the
    /// waitlist size and to the capacity left on the event.
    pub fn select_winners_with<R: Rng + ?Sized>(
        &self,
        event_id: &str,
        count: i64,
        rng: &mut R,
    ) -> LotteryResult<Vec<UserId>> {
        if count < 0 {
            return Err(LotteryError::Validation(format!(
                "winner count must not be negative, got {count}"
            )));
        }
        if count == 0 {
            debug!(event_id, "draw of zero winners requested");
            return Ok(Vec::new());
        }

        self.locks.with_event(event_id, || -> LotteryResult<Vec<UserId>> {
            let mut event = self
                .store
                .event(event_id)?
                .ok_or_else(|| LotteryError::EventNotFound(event_id.to_string()))?;

            if event.waitlist_user_ids.is_empty() {
                debug!(event_id, "draw skipped, waitlist empty");
                return Ok(Vec::new());
            }

            let take = draw_size(&event, count)?;
            let pool: Vec<UserId> = event.waitlist_user_ids.iter().cloned().collect();
            let winners: Vec<UserId> = rand::seq::index::sample(rng, pool.len(), take)
                .into_iter()
                .map(|idx| pool[idx].clone())
                .collect();

            let mut batch = WriteBatch::new();
            for user_id in &winners {
                event.waitlist_user_ids.remove(user_id);
                event.chosen_user_ids.insert(user_id.clone());

                let mut entrant = self
                    .store
                    .entrant(event_id, user_id)?
                    .unwrap_or_else(|| EntrantRecord::applied(event_id, user_id, now_ms()));
                entrant.status = MembershipStatus::Chosen;
                entrant.winner_notified = false;
                entrant.loss_notice_pending = false;
                batch.set(Document::Entrant(entrant));
            }

            let losers = self.store.entrants(&[
                Filter::eq("eventId", event_id),
                Filter::eq("status", MembershipStatus::Applied.as_str()),
                Filter::eq("lossNoticePending", false),
            ])?;
            for mut entrant in losers {
                if event.waitlist_user_ids.contains(&entrant.user_id) {
                    entrant.loss_notice_pending = true;
                    batch.set(Document::Entrant(entrant));
                }
            }
            let remaining = event.waitlist_user_ids.len();
            batch.set(Document::Event(event));
            self.store.commit(batch)?;

            info!(event_id, drawn = winners.len(), remaining, "lottery drawn");
            Ok(winners)
        })
    }
}

fn draw_size(event: &EventRecord, count: i64) -> LotteryResult<usize> {
    let requested = usize::try_from(count).unwrap_or(usize::MAX);
    let mut take = requested.min(event.waitlist_user_ids.len());

    if let Some(capacity) = event.capacity {
        let remaining = event.remaining_capacity().unwrap_or(0);
        if remaining == 0 {
            return Err(LotteryError::CapacityExceeded {
                event_id: event.id.clone(),
                capacity,
            });
        }
        take = take.min(remaining);
    }
    Ok(take)
}
