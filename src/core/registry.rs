use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    batch::WriteBatch,
    error::{LotteryError, LotteryResult},
    event::{EntrantRecord, EventDraft, EventRecord},
    persist::{Collection, Document, DocumentStore, Filter},
    types::{EntrantStatus, InvitationResponse, InvitationStatus},
    view::status::{EntrantStatusView, derive_status},
};

use super::{dispatch::NotificationTemplate, locks::EventLocks, now_ms};

/// Result of an `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The user was added to the waitlist.
    Applied,
    /// The user was already in one of the event's sets; nothing changed.
    AlreadyApplied,
}

/// Set sizes for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntrantCounts {
    pub waitlisted: usize,
    pub chosen: usize,
    pub cancelled: usize,
    pub accepted: usize,
}

/// Tracks applicants per event and their self-service transitions.
pub struct EntrantRegistry {
    store: Arc<dyn DocumentStore>,
    locks: Arc<EventLocks>,
    template: NotificationTemplate,
}

impl EntrantRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, locks: Arc<EventLocks>, template: NotificationTemplate) -> Self {
        Self {
            store,
            locks,
            template,
        }
    }

    pub fn create_event(&self, draft: EventDraft) -> LotteryResult<EventRecord> {
        if draft.title.trim().is_empty() {
            return Err(LotteryError::Validation("event title must not be blank".to_string()));
        }
        if draft.capacity == Some(0) {
            return Err(LotteryError::Validation("capacity must be positive".to_string()));
        }
        if let (Some(open), Some(close)) = (draft.registration_open_at_ms, draft.registration_close_at_ms) {
            if close < open {
                return Err(LotteryError::Validation(
                    "registration closes before it opens".to_string(),
                ));
            }
        }

        let event = draft.into_record(Uuid::new_v4().to_string());
        let mut batch = WriteBatch::new();
        batch.set(Document::Event(event.clone()));
        self.store.commit(batch)?;

        info!(event_id = %event.id, title = %event.title, "event created");
        Ok(event)
    }

    pub fn event(&self, event_id: &str) -> LotteryResult<EventRecord> {
        self.store
            .event(event_id)?
            .ok_or_else(|| LotteryError::EventNotFound(event_id.to_string()))
    }

    pub fn apply(&self, event_id: &str, user_id: &str) -> LotteryResult<ApplyOutcome> {
        self.apply_at(event_id, user_id, now_ms())
    }

    /// Adds `user_id` to the waitlist as of `now_ms`.
    pub fn apply_at(&self, event_id: &str, user_id: &str, now_ms: u64) -> LotteryResult<ApplyOutcome> {
        validate_user_id(user_id)?;

        self.locks.with_event(event_id, || -> LotteryResult<ApplyOutcome> {
            let mut event = self.event(event_id)?;
            if event.contains(user_id) {
                debug!(event_id, user_id, "apply ignored, already associated");
                return Ok(ApplyOutcome::AlreadyApplied);
            }
            if !event.is_registration_open_at(now_ms) {
                return Err(LotteryError::RegistrationClosed(event_id.to_string()));
            }

            event.waitlist_user_ids.insert(user_id.to_string());
            let waitlisted = event.waitlist_user_ids.len();

            let mut batch = WriteBatch::new();
            batch
                .set(Document::Event(event))
                .set(Document::Entrant(EntrantRecord::applied(event_id, user_id, now_ms)));
            self.store.commit(batch)?;

            info!(event_id, user_id, waitlisted, "entrant applied");
            Ok(ApplyOutcome::Applied)
        })
    }

    /// Removes `user_id` from the event entirely; false when it was absent.
    pub fn withdraw(&self, event_id: &str, user_id: &str) -> LotteryResult<bool> {
        self.locks.with_event(event_id, || -> LotteryResult<bool> {
            let mut event = self.event(event_id)?;
            let had_membership = self.store.entrant(event_id, user_id)?.is_some();
            let removed = event.remove_entrant(user_id);
            if !removed && !had_membership {
                debug!(event_id, user_id, "withdraw ignored, not associated");
                return Ok(false);
            }

            let mut batch = WriteBatch::new();
            batch
                .set(Document::Event(event))
                .delete(Collection::Entrants, EntrantRecord::doc_id(event_id, user_id));
            self.store.commit(batch)?;

            info!(event_id, user_id, "entrant withdrew");
            Ok(true)
        })
    }

    /// Records the entrant's answer to an issued invitation.
    pub fn respond(
        &self,
        event_id: &str,
        user_id: &str,
        response: InvitationResponse,
    ) -> LotteryResult<EntrantStatus> {
        self.locks.with_event(event_id, || -> LotteryResult<EntrantStatus> {
            let mut event = self.event(event_id)?;
            if !event.chosen_user_ids.contains(user_id) || !event.invitation_status.contains_key(user_id) {
                return Err(LotteryError::Validation(format!(
                    "user {user_id} has no open invitation for event {event_id}"
                )));
            }

            match response {
                InvitationResponse::Accepted => {
                    event
                        .invitation_status
                        .insert(user_id.to_string(), InvitationStatus::Accepted);
                }
                InvitationResponse::Declined => {
                    event.chosen_user_ids.remove(user_id);
                    event.invitation_status.remove(user_id);
                    event.cancelled_user_ids.insert(user_id.to_string());
                }
            }

            let status = derive_status(&event, user_id);
            let mut batch = WriteBatch::new();
            batch.set(Document::Event(event));
            self.store.commit(batch)?;

            info!(event_id, user_id, ?response, "invitation answered");
            Ok(status)
        })
    }

    /// Organizer removal of a chosen entrant.
    ///
    /// Moves the entrant to `cancelled`, which frees their capacity spot, and
    /// commits the cancellation notice in the same batch.
    pub fn cancel_entrant(&self, event_id: &str, user_id: &str) -> LotteryResult<()> {
        self.locks.with_event(event_id, || -> LotteryResult<()> {
            let mut event = self.event(event_id)?;
            if !event.chosen_user_ids.remove(user_id) {
                return Err(LotteryError::Validation(format!(
                    "user {user_id} is not chosen for event {event_id}"
                )));
            }
            event.invitation_status.remove(user_id);
            event.cancelled_user_ids.insert(user_id.to_string());

            let notice = self.template.cancelled(&event, user_id);
            let mut batch = WriteBatch::new();
            batch
                .set(Document::Event(event))
                .set(Document::Notification(notice));
            self.store.commit(batch)?;

            info!(event_id, user_id, "entrant cancelled by organizer");
            Ok(())
        })
    }

    /// Derived status; unknown events and users read as `NotApplied`.
    pub fn status_of(&self, event_id: &str, user_id: &str) -> EntrantStatus {
        match self.store.event(event_id) {
            Ok(Some(event)) => derive_status(&event, user_id),
            Ok(None) => EntrantStatus::NotApplied,
            Err(err) => {
                warn!(event_id, user_id, error = %err, "status lookup failed");
                EntrantStatus::NotApplied
            }
        }
    }

    pub fn counts(&self, event_id: &str) -> LotteryResult<EntrantCounts> {
        let event = self.event(event_id)?;
        Ok(EntrantCounts {
            waitlisted: event.waitlist_user_ids.len(),
            chosen: event.chosen_user_ids.len(),
            cancelled: event.cancelled_user_ids.len(),
            accepted: event.accepted_count(),
        })
    }

    /// Every event the user is associated with, ordered by event id.
    pub fn history(&self, user_id: &str) -> LotteryResult<Vec<EntrantStatusView>> {
        let mut events = BTreeMap::new();
        for field in ["waitlistUserIds", "chosenUserIds", "cancelledUserIds"] {
            for event in self.store.events(&[Filter::array_contains(field, user_id)])? {
                events.entry(event.id.clone()).or_insert(event);
            }
        }

        Ok(events
            .values()
            .map(|event| EntrantStatusView::for_user(event, user_id))
            .collect())
    }
}

fn validate_user_id(user_id: &str) -> LotteryResult<()> {
    if user_id.trim().is_empty() {
        return Err(LotteryError::Validation("user id must not be blank".to_string()));
    }
    Ok(())
}
