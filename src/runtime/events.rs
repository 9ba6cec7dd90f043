//! Runtime event stream payloads.

use crate::{
    event::EntrantSet,
    types::{EventId, InvitationResponse, UserId},
};

/// Events emitted after a worker commits a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotteryEvent {
    /// A user joined an event's waitlist.
    Applied {
        /// Event applied to.
        event_id: EventId,
        /// Applicant.
        user_id: UserId,
    },
    /// A user left an event.
    Withdrawn {
        /// Event left.
        event_id: EventId,
        /// Departing user.
        user_id: UserId,
    },
    /// A lottery draw moved users to the chosen set.
    WinnersSelected {
        /// Event drawn.
        event_id: EventId,
        /// Winners in draw order.
        winners: Vec<UserId>,
    },
    /// Winner notifications were committed.
    WinnersNotified {
        /// Event dispatched.
        event_id: EventId,
        /// Entrants notified by the call.
        notified: Vec<UserId>,
    },
    /// A chosen entrant answered their invitation.
    InvitationAnswered {
        /// Event concerned.
        event_id: EventId,
        /// Responding entrant.
        user_id: UserId,
        /// The answer.
        response: InvitationResponse,
    },
    /// The organizer cancelled a chosen entrant.
    EntrantCancelled {
        /// Event concerned.
        event_id: EventId,
        /// Cancelled entrant.
        user_id: UserId,
    },
    /// "Not selected" notices were committed.
    LosersNotified {
        /// Event dispatched.
        event_id: EventId,
        /// Entrants notified by the call.
        notified: Vec<UserId>,
    },
    /// An organizer message reached one entrant set.
    GroupNotified {
        /// Event concerned.
        event_id: EventId,
        /// Addressed set.
        set: EntrantSet,
        /// Recipients.
        notified: Vec<UserId>,
    },
}
