use serde::Serialize;

use crate::{
    event::EventRecord,
    types::{EntrantStatus, EventId, InvitationStatus},
};

/// Derives `user_id`'s display status for `event`.
///
/// Membership in `chosen` always wins over `cancelled` and `waitlist`, so a
/// user caught in two sets mid-update never reads as declined while chosen.
pub fn derive_status(event: &EventRecord, user_id: &str) -> EntrantStatus {
    if event.chosen_user_ids.contains(user_id) {
        return match event.invitation_status.get(user_id) {
            Some(InvitationStatus::Accepted) => EntrantStatus::Enrolled,
            Some(InvitationStatus::Declined) => EntrantStatus::Declined,
            Some(InvitationStatus::Pending) | None => EntrantStatus::Selected,
        };
    }
    if event.cancelled_user_ids.contains(user_id) {
        return EntrantStatus::Declined;
    }
    if event.waitlist_user_ids.contains(user_id) {
        return EntrantStatus::Waitlisted;
    }
    EntrantStatus::NotApplied
}

/// One row of an entrant's event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrantStatusView {
    pub event_id: EventId,
    pub title: String,
    pub status: EntrantStatus,
    pub label: &'static str,
}

impl EntrantStatusView {
    pub fn for_user(event: &EventRecord, user_id: &str) -> Self {
        let status = derive_status(event, user_id);
        Self {
            event_id: event.id.clone(),
            title: event.title.clone(),
            status,
            label: status.label(),
        }
    }
}
