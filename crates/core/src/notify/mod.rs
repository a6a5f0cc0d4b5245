//! Notification ports and post-commit event delivery.
//!
//! The workflows only produce [`DomainEvent`](crate::events::DomainEvent)s.
//! After a change is committed the [`EventDispatcher`] turns each event into
//! a [`DeliveryPlan`] and hands the pieces to the configured sinks on a
//! background task.

pub mod dispatcher;
pub mod plan;
pub mod ports;

pub use dispatcher::EventDispatcher;
pub use plan::{DeliveryPlan, plan};
pub use ports::{
    BroadcastMessage, Broadcaster, ContactDirectory, EmailRequest, EmailSink, EmailType,
    NewNotification, NoopSink, NotificationSink, NotificationType, NotifyError,
};
