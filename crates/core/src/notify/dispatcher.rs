//! Fire-and-forget delivery of committed domain events.

use std::sync::Arc;

use super::plan::plan;
use super::ports::{Broadcaster, EmailSink, NoopSink, NotificationSink};
use crate::events::DomainEvent;

/// Fans committed events out to the notification ports.
///
/// Delivery never fails the caller: every port error is logged and skipped.
#[derive(Clone)]
pub struct EventDispatcher {
    notifications: Arc<dyn NotificationSink>,
    email: Arc<dyn EmailSink>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher").finish_non_exhaustive()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::disabled()
    }
}

impl EventDispatcher {
    /// Creates a dispatcher over the given ports.
    pub fn new(
        notifications: Arc<dyn NotificationSink>,
        email: Arc<dyn EmailSink>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            notifications,
            email,
            broadcaster,
        }
    }

    /// A dispatcher that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        let noop = Arc::new(NoopSink);
        Self::new(noop.clone(), noop.clone(), noop)
    }

    /// Delivers `events` on a background task. Returns immediately.
    ///
    /// Outside a Tokio runtime the events are dropped with a warning.
    pub fn dispatch(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dispatcher = self.clone();
                handle.spawn(async move {
                    dispatcher.deliver(events).await;
                });
            }
            Err(_) => {
                tracing::warn!(count = events.len(), "no async runtime, dropping events");
            }
        }
    }

    /// Delivers `events` in order and returns the number of failed
    /// deliveries.
    pub async fn deliver(&self, events: Vec<DomainEvent>) -> usize {
        let mut failures = 0;
        for event in events {
            let delivery = plan(&event);
            tracing::debug!(
                event = event.name(),
                notifications = delivery.notifications.len(),
                emails = delivery.emails.len(),
                broadcasts = delivery.broadcasts.len(),
                "delivering event"
            );

            for notification in delivery.notifications {
                if let Err(e) = self.notifications.create_notification(notification).await {
                    failures += 1;
                    tracing::warn!(event = event.name(), error = %e, "notification failed");
                }
            }
            for request in delivery.emails {
                if let Err(e) = self.email.send_email_by_type(request).await {
                    failures += 1;
                    tracing::warn!(event = event.name(), error = %e, "email failed");
                }
            }
            for message in delivery.broadcasts {
                if let Err(e) = self.broadcaster.publish(message).await {
                    failures += 1;
                    tracing::warn!(event = event.name(), error = %e, "broadcast failed");
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Recipient, StatusChanged};
    use crate::machine::EntityKind;
    use crate::notify::ports::{
        EmailType, MockBroadcaster, MockEmailSink, MockNotificationSink, NotifyError,
    };
    use uuid::Uuid;

    fn awarded(recipients: Vec<Recipient>) -> DomainEvent {
        DomainEvent::StatusChanged(StatusChanged {
            entity: EntityKind::Bid,
            entity_id: Uuid::new_v4(),
            reference: "BID-2026-0001".to_string(),
            from: "submitted".to_string(),
            to: "awarded".to_string(),
            actor_id: Uuid::new_v4(),
            forced: false,
            reason: None,
            recipients,
        })
    }

    #[tokio::test]
    async fn test_email_failure_does_not_stop_delivery() {
        let mut notifications = MockNotificationSink::new();
        notifications
            .expect_create_notification()
            .times(2)
            .returning(|_| Ok(()));
        let mut email = MockEmailSink::new();
        email
            .expect_send_email_by_type()
            .withf(|request| request.email_type == EmailType::BidAwarded)
            .times(2)
            .returning(|request| Err(NotifyError::NoAddress(request.recipient)));
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_publish().never();

        let dispatcher =
            EventDispatcher::new(Arc::new(notifications), Arc::new(email), Arc::new(broadcaster));
        let failures = dispatcher
            .deliver(vec![
                awarded(vec![Recipient::Company(Uuid::new_v4())]),
                awarded(vec![Recipient::Company(Uuid::new_v4())]),
            ])
            .await;
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_swallows_everything() {
        let failures = EventDispatcher::disabled()
            .deliver(vec![awarded(vec![Recipient::User(Uuid::new_v4())])])
            .await;
        assert_eq!(failures, 0);
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_background() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut notifications = MockNotificationSink::new();
        notifications
            .expect_create_notification()
            .times(1)
            .returning(move |n| {
                tx.send(n.recipient).ok();
                Ok(())
            });
        let dispatcher = EventDispatcher::new(
            Arc::new(notifications),
            Arc::new(NoopSink),
            Arc::new(NoopSink),
        );

        let recipient = Recipient::User(Uuid::new_v4());
        dispatcher.dispatch(vec![awarded(vec![recipient])]);
        let received = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(std::time::Duration::from_secs(5))
        })
        .await
        .unwrap();
        assert_eq!(received.ok(), Some(recipient));
    }

    #[test]
    fn test_dispatch_without_runtime_is_harmless() {
        EventDispatcher::disabled().dispatch(vec![awarded(Vec::new())]);
    }
}
