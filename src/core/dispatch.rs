use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    batch::WriteBatch,
    error::{LotteryError, LotteryResult},
    event::{EntrantRecord, EntrantSet, EventRecord, NotificationRecord},
    persist::{Document, DocumentStore, Filter},
    types::{EventId, InvitationStatus, MembershipStatus, UserId},
};

use super::locks::EventLocks;

/// Wording of the notices the core sends.
///
/// `{event}` in any title or message is replaced by the event title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationTemplate {
    pub winner_title: String,
    pub winner_message: String,
    /// Sent to entrants a draw left on the waitlist.
    pub loser_title: String,
    pub loser_message: String,
    /// Sent when the organizer cancels a chosen entrant.
    pub cancelled_title: String,
    pub cancelled_message: String,
    /// Title of organizer group messages.
    pub group_title: String,
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self {
            winner_title: "You won the lottery!".to_string(),
            winner_message: "You have been selected for {event}. Please accept or decline your invitation."
                .to_string(),
            loser_title: "Lottery Update".to_string(),
            loser_message: "You were not selected in the recent draw for {event}. \
                            You remain on the waitlist for future chances."
                .to_string(),
            cancelled_title: "Event Update: {event}".to_string(),
            cancelled_message: "Your invitation has been cancelled.".to_string(),
            group_title: "Update: {event}".to_string(),
        }
    }
}

impl NotificationTemplate {
    pub(crate) fn winner(&self, event: &EventRecord, recipient: &str) -> NotificationRecord {
        render(event, recipient, &self.winner_title, &self.winner_message)
    }

    pub(crate) fn loser(&self, event: &EventRecord, recipient: &str) -> NotificationRecord {
        render(event, recipient, &self.loser_title, &self.loser_message)
    }

    pub(crate) fn cancelled(&self, event: &EventRecord, recipient: &str) -> NotificationRecord {
        render(event, recipient, &self.cancelled_title, &self.cancelled_message)
    }
}

fn render(event: &EventRecord, recipient: &str, title: &str, message: &str) -> NotificationRecord {
    NotificationRecord {
        id: Uuid::new_v4().to_string(),
        recipient_id: recipient.to_string(),
        event_id: event.id.clone(),
        title: title.replace("{event}", &event.title),
        message: message.replace("{event}", &event.title),
        created_at: Utc::now(),
        read: false,
    }
}

/// Outcome of one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub event_id: EventId,
    /// Entrants notified by this call, in id order.
    pub notified: Vec<UserId>,
}

impl DispatchReport {
    pub fn count(&self) -> usize {
        self.notified.len()
    }
}

/// Sends winner notifications exactly once per chosen entrant, and serves the
/// resulting inbox.
pub struct NotificationDispatcher {
    store: Arc<dyn DocumentStore>,
    locks: Arc<EventLocks>,
    template: NotificationTemplate,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, locks: Arc<EventLocks>, template: NotificationTemplate) -> Self {
        Self {
            store,
            locks,
            template,
        }
    }

    /// Notifies every chosen entrant whose `winnerNotified` flag is unset.
    ///
    /// Notification records, flag flips, and pending invitations commit in a
    /// single batch. A repeated call finds nobody left to notify.
    pub fn dispatch_winner_notifications(&self, event_id: &str) -> LotteryResult<DispatchReport> {
        self.locks.with_event(event_id, || -> LotteryResult<DispatchReport> {
            let mut event = self
                .store
                .event(event_id)?
                .ok_or_else(|| LotteryError::EventNotFound(event_id.to_string()))?;

            let pending: Vec<EntrantRecord> = self
                .store
                .entrants(&[
                    Filter::eq("eventId", event_id),
                    Filter::eq("status", MembershipStatus::Chosen.as_str()),
                    Filter::eq("winnerNotified", false),
                ])?
                .into_iter()
                .filter(|entrant| event.chosen_user_ids.contains(&entrant.user_id))
                .collect();

            let mut report = DispatchReport {
                event_id: event_id.to_string(),
                notified: Vec::new(),
            };
            if pending.is_empty() {
                debug!(event_id, "no chosen entrants awaiting notification");
                return Ok(report);
            }

            let mut batch = WriteBatch::new();
            for mut entrant in pending {
                batch.set(Document::Notification(self.template.winner(&event, &entrant.user_id)));
                event
                    .invitation_status
                    .insert(entrant.user_id.clone(), InvitationStatus::Pending);
                report.notified.push(entrant.user_id.clone());

                entrant.winner_notified = true;
                entrant.status = MembershipStatus::Notified;
                batch.set(Document::Entrant(entrant));
            }
            batch.set(Document::Event(event));

            if let Err(source) = self.store.commit(batch) {
                warn!(event_id, error = %source, "winner notification batch failed");
                return Err(LotteryError::Dispatch {
                    event_id: event_id.to_string(),
                    source,
                });
            }

            info!(event_id, notified = report.count(), "winner notifications dispatched");
            Ok(report)
        })
    }

    /// Sends the "not selected" notice to entrants a draw left on the waitlist.
    ///
    /// Only memberships flagged by a draw are considered, and the flag is
    /// cleared in the same batch as the notices, so a retry sends nothing twice.
    pub fn dispatch_loser_notifications(&self, event_id: &str) -> LotteryResult<DispatchReport> {
        self.locks.with_event(event_id, || -> LotteryResult<DispatchReport> {
            let event = self
                .store
                .event(event_id)?
                .ok_or_else(|| LotteryError::EventNotFound(event_id.to_string()))?;

            let pending: Vec<EntrantRecord> = self
                .store
                .entrants(&[
                    Filter::eq("eventId", event_id),
                    Filter::eq("lossNoticePending", true),
                ])?
                .into_iter()
                .filter(|entrant| event.waitlist_user_ids.contains(&entrant.user_id))
                .collect();

            let mut report = DispatchReport {
                event_id: event_id.to_string(),
                notified: Vec::new(),
            };
            if pending.is_empty() {
                debug!(event_id, "no waitlisted entrants awaiting a draw notice");
                return Ok(report);
            }

            let mut batch = WriteBatch::new();
            for mut entrant in pending {
                batch.set(Document::Notification(self.template.loser(&event, &entrant.user_id)));
                report.notified.push(entrant.user_id.clone());
                entrant.loss_notice_pending = false;
                batch.set(Document::Entrant(entrant));
            }

            if let Err(source) = self.store.commit(batch) {
                warn!(event_id, error = %source, "draw notice batch failed");
                return Err(LotteryError::Dispatch {
                    event_id: event_id.to_string(),
                    source,
                });
            }

            info!(event_id, notified = report.count(), "draw notices dispatched");
            Ok(report)
        })
    }

    /// Sends an organizer message to every member of one entrant set.
    ///
    /// All notices commit in one batch; an empty set sends nothing.
    pub fn notify_group(
        &self,
        event_id: &str,
        set: EntrantSet,
        title: Option<&str>,
        message: &str,
    ) -> LotteryResult<DispatchReport> {
        if message.trim().is_empty() {
            return Err(LotteryError::Validation("message must not be blank".to_string()));
        }

        let event = self
            .store
            .event(event_id)?
            .ok_or_else(|| LotteryError::EventNotFound(event_id.to_string()))?;
        let title = title.unwrap_or(self.template.group_title.as_str());

        let report = DispatchReport {
            event_id: event_id.to_string(),
            notified: event.members(set).iter().cloned().collect(),
        };
        if report.notified.is_empty() {
            return Ok(report);
        }

        let mut batch = WriteBatch::new();
        for user_id in &report.notified {
            batch.set(Document::Notification(render(&event, user_id, title, message)));
        }
        if let Err(source) = self.store.commit(batch) {
            return Err(LotteryError::Dispatch {
                event_id: event_id.to_string(),
                source,
            });
        }

        info!(event_id, ?set, notified = report.count(), "group message sent");
        Ok(report)
    }

    /// Notifications addressed to `user_id`, newest first.
    pub fn notifications_for(&self, user_id: &str, unread_only: bool) -> LotteryResult<Vec<NotificationRecord>> {
        let mut filters = vec![Filter::eq("recipientId", user_id)];
        if unread_only {
            filters.push(Filter::eq("read", false));
        }
        let mut out = self.store.notifications(&filters)?;
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub fn mark_read(&self, notification_id: &str) -> LotteryResult<()> {
        let mut notification = self
            .store
            .notification(notification_id)?
            .ok_or_else(|| LotteryError::NotificationNotFound(notification_id.to_string()))?;
        if notification.read {
            return Ok(());
        }

        notification.read = true;
        let mut batch = WriteBatch::new();
        batch.set(Document::Notification(notification));
        self.store.commit(batch)?;
        Ok(())
    }

    /// Marks every unread notification of `user_id` as read in one batch.
    pub fn mark_all_read(&self, user_id: &str) -> LotteryResult<usize> {
        let unread = self.notifications_for(user_id, true)?;
        if unread.is_empty() {
            return Ok(0);
        }

        let marked = unread.len();
        let mut batch = WriteBatch::new();
        for mut notification in unread {
            notification.read = true;
            batch.set(Document::Notification(notification));
        }
        self.store.commit(batch)?;

        info!(user_id, marked, "notifications marked read");
        Ok(marked)
    }
}
