//! Event, membership, and notification documents.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    EventId, InvitationStatus, MembershipStatus, NotificationId, UserId,
};

/// Which of the three disjoint entrant sets holds a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntrantSet {
    /// `waitlistUserIds`.
    Waitlist,
    /// `chosenUserIds`.
    Chosen,
    /// `cancelledUserIds`.
    Cancelled,
}

/// Authoritative event document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventRecord {
    /// Stable event identifier.
    pub id: EventId,
    /// Display title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Organizer display name.
    pub organizer: String,
    /// Category tags.
    pub tags: BTreeSet<String>,
    /// Calendar date of the event, if scheduled.
    pub date: Option<NaiveDate>,
    /// Maximum number of chosen entrants; `None` is unlimited.
    pub capacity: Option<u32>,
    /// Registration opens at this epoch millisecond (inclusive).
    pub registration_open_at_ms: Option<u64>,
    /// Registration closes at this epoch millisecond (inclusive).
    pub registration_close_at_ms: Option<u64>,
    /// Applicants awaiting a draw.
    pub waitlist_user_ids: BTreeSet<UserId>,
    /// Lottery winners.
    pub chosen_user_ids: BTreeSet<UserId>,
    /// Entrants who declined their invitation.
    pub cancelled_user_ids: BTreeSet<UserId>,
    /// Invitation answers, keyed by chosen entrant.
    pub invitation_status: BTreeMap<UserId, InvitationStatus>,
}

impl EventRecord {
    /// Returns the set currently holding `user_id`, if any.
    pub fn set_of(&self, user_id: &str) -> Option<EntrantSet> {
        if self.chosen_user_ids.contains(user_id) {
            Some(EntrantSet::Chosen)
        } else if self.cancelled_user_ids.contains(user_id) {
            Some(EntrantSet::Cancelled)
        } else if self.waitlist_user_ids.contains(user_id) {
            Some(EntrantSet::Waitlist)
        } else {
            None
        }
    }

    /// Members of `set`.
    pub fn members(&self, set: EntrantSet) -> &BTreeSet<UserId> {
        match set {
            EntrantSet::Waitlist => &self.waitlist_user_ids,
            EntrantSet::Chosen => &self.chosen_user_ids,
            EntrantSet::Cancelled => &self.cancelled_user_ids,
        }
    }

    /// True when `user_id` is in any of the three sets.
    pub fn contains(&self, user_id: &str) -> bool {
        self.set_of(user_id).is_some()
    }

    /// Removes `user_id` from every set and the invitation map.
    ///
    /// Returns true when anything was removed.
    pub fn remove_entrant(&mut self, user_id: &str) -> bool {
        let waitlist = self.waitlist_user_ids.remove(user_id);
        let chosen = self.chosen_user_ids.remove(user_id);
        let cancelled = self.cancelled_user_ids.remove(user_id);
        self.invitation_status.remove(user_id);
        waitlist || chosen || cancelled
    }

    /// True when `now_ms` falls inside the declared registration window.
    pub fn is_registration_open_at(&self, now_ms: u64) -> bool {
        let start_ok = self.registration_open_at_ms.is_none_or(|open| now_ms >= open);
        let end_ok = self.registration_close_at_ms.is_none_or(|close| now_ms <= close);
        start_ok && end_ok
    }

    /// Spots left before capacity; `None` when unlimited.
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.capacity
            .map(|cap| (cap as usize).saturating_sub(self.chosen_user_ids.len()))
    }

    /// Number of chosen entrants who accepted.
    pub fn accepted_count(&self) -> usize {
        self.invitation_status
            .values()
            .filter(|status| **status == InvitationStatus::Accepted)
            .count()
    }
}

/// Input used to create a new [`EventRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventDraft {
    /// Display title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Organizer display name.
    pub organizer: String,
    /// Category tags.
    pub tags: BTreeSet<String>,
    /// Calendar date of the event.
    pub date: Option<NaiveDate>,
    /// Maximum number of chosen entrants.
    pub capacity: Option<u32>,
    /// Registration opening bound in epoch milliseconds.
    pub registration_open_at_ms: Option<u64>,
    /// Registration closing bound in epoch milliseconds.
    pub registration_close_at_ms: Option<u64>,
}

impl EventDraft {
    /// Draft with a title and everything else empty.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Materializes the draft under `id` with empty entrant sets.
    pub fn into_record(self, id: EventId) -> EventRecord {
        EventRecord {
            id,
            title: self.title,
            description: self.description,
            organizer: self.organizer,
            tags: self.tags,
            date: self.date,
            capacity: self.capacity,
            registration_open_at_ms: self.registration_open_at_ms,
            registration_close_at_ms: self.registration_close_at_ms,
            ..EventRecord::default()
        }
    }
}

/// Per-event, per-entrant lottery membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrantRecord {
    /// Owning event.
    pub event_id: EventId,
    /// Entrant.
    pub user_id: UserId,
    /// Forward-only membership state.
    pub status: MembershipStatus,
    /// Set once the winner notification has been committed.
    pub winner_notified: bool,
    /// Set by a draw that left this entrant on the waitlist; cleared once the
    /// "not selected" notice is committed.
    #[serde(default)]
    pub loss_notice_pending: bool,
    /// Application timestamp in milliseconds since epoch.
    pub applied_at_ms: u64,
}

impl EntrantRecord {
    /// Fresh membership for a new applicant.
    pub fn applied(event_id: &str, user_id: &str, applied_at_ms: u64) -> Self {
        Self {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            status: MembershipStatus::Applied,
            winner_notified: false,
            loss_notice_pending: false,
            applied_at_ms,
        }
    }

    /// Document id of this membership.
    pub fn id(&self) -> String {
        Self::doc_id(&self.event_id, &self.user_id)
    }

    /// Document id for the (event, user) pair.
    pub fn doc_id(event_id: &str, user_id: &str) -> String {
        format!("{event_id}:{user_id}")
    }
}

/// Message delivered to a user's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Notification identifier.
    pub id: NotificationId,
    /// Addressee.
    pub recipient_id: UserId,
    /// Event the message is about.
    pub event_id: EventId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has read it.
    pub read: bool,
}
