//! Shared identifiers and lifecycle enums.

use serde::{Deserialize, Serialize};

/// Stable event identifier.
pub type EventId = String;
/// User (entrant) identifier.
pub type UserId = String;
/// Notification document identifier.
pub type NotificationId = String;

/// Answer recorded for a chosen entrant's invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    /// Invitation issued, no answer yet.
    Pending,
    /// Entrant accepted the invitation.
    Accepted,
    /// Entrant declined the invitation.
    Declined,
}

/// Entrant's answer to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationResponse {
    /// Take the spot.
    Accepted,
    /// Give the spot up.
    Declined,
}

/// Forward-only lottery membership state stored per (event, entrant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    /// On the waitlist.
    Applied,
    /// Drawn by the lottery, not yet notified.
    Chosen,
    /// Winner notification committed.
    Notified,
}

impl MembershipStatus {
    /// Wire name used in persisted documents and query filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Chosen => "chosen",
            Self::Notified => "notified",
        }
    }
}

/// Display status derived from an event's entrant sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntrantStatus {
    /// Not associated with the event.
    NotApplied,
    /// Waiting for a draw.
    Waitlisted,
    /// Chosen, invitation not accepted yet.
    Selected,
    /// Chosen and accepted.
    Enrolled,
    /// Declined or cancelled.
    Declined,
}

impl EntrantStatus {
    /// Human-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotApplied => "Not applied",
            Self::Waitlisted => "Waitlisted",
            Self::Selected => "Selected",
            Self::Enrolled => "Enrolled",
            Self::Declined => "Declined",
        }
    }
}
