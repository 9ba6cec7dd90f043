//! Error taxonomy for lottery operations.

use crate::{
    persist::PersistError,
    types::{EventId, NotificationId},
};

/// Failure of a registry, lottery, or dispatch operation.
///
/// Mutations are all-or-nothing: any error means nothing was committed.
#[derive(Debug, thiserror::Error)]
pub enum LotteryError {
    /// Referenced event does not exist.
    #[error("event not found: {0}")]
    EventNotFound(EventId),
    /// Referenced notification does not exist.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),
    /// The event's chosen set already fills its capacity.
    #[error("event {event_id} is at capacity ({capacity})")]
    CapacityExceeded {
        /// Event that is full.
        event_id: EventId,
        /// Declared capacity.
        capacity: u32,
    },
    /// The atomic winner-notification batch failed to commit.
    #[error("winner notification dispatch failed for event {event_id}: {source}")]
    Dispatch {
        /// Event being dispatched.
        event_id: EventId,
        /// Underlying store failure.
        #[source]
        source: PersistError,
    },
    /// Malformed caller input.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Application attempted outside the event's registration window.
    #[error("registration is closed for event {0}")]
    RegistrationClosed(EventId),
    /// Store read or commit failed.
    #[error(transparent)]
    Store(#[from] PersistError),
}

impl LotteryError {
    /// True for transient store failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dispatch { .. } | Self::Store(_))
    }
}

/// Result alias for lottery operations.
pub type LotteryResult<T> = Result<T, LotteryError>;
