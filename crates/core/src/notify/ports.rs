//! Outbound ports for notifications, email and live broadcasts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::events::Recipient;
use crate::machine::EntityKind;

/// Errors raised by notification adapters.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The recipient could not be resolved to an address.
    #[error("No address for recipient {0:?}")]
    NoAddress(Recipient),

    /// The persisted notification could not be written.
    #[error("Notification store error: {0}")]
    Store(String),

    /// The email could not be sent.
    #[error("Email delivery failed: {0}")]
    Email(String),

    /// The live channel rejected the message.
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
}

/// Kind of in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A company was invited to bid.
    RfqInvitation,
    /// An RFQ changed status.
    RfqStatusChanged,
    /// A bid changed status.
    BidStatusChanged,
    /// A negotiation message arrived.
    NegotiationMessage,
    /// A negotiation was closed, reopened or cancelled.
    NegotiationStatusChanged,
    /// A purchase order was issued or changed status.
    PurchaseOrderStatusChanged,
    /// A purchase order modification was requested or reviewed.
    PurchaseOrderModification,
}

impl NotificationType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RfqInvitation => "rfq_invitation",
            Self::RfqStatusChanged => "rfq_status_changed",
            Self::BidStatusChanged => "bid_status_changed",
            Self::NegotiationMessage => "negotiation_message",
            Self::NegotiationStatusChanged => "negotiation_status_changed",
            Self::PurchaseOrderStatusChanged => "purchase_order_status_changed",
            Self::PurchaseOrderModification => "purchase_order_modification",
        }
    }
}

/// A notification to persist for later reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
    /// Kind.
    pub notification_type: NotificationType,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Who should see it.
    pub recipient: Recipient,
    /// User who caused it.
    pub related_user_id: Option<Uuid>,
    /// Entity it is about.
    pub related_entity_id: Uuid,
    /// Kind of that entity.
    pub related_entity_type: EntityKind,
}

/// Templated email kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Invitation to bid on an RFQ.
    RfqInvitation,
    /// An RFQ the recipient was involved in was cancelled.
    RfqCancelled,
    /// The recipient's bid won.
    BidAwarded,
    /// The recipient's bid lost or was rejected.
    BidRejected,
    /// A purchase order was sent to the recipient.
    PurchaseOrderIssued,
    /// A purchase order was approved internally.
    PurchaseOrderApproved,
}

impl EmailType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RfqInvitation => "rfq_invitation",
            Self::RfqCancelled => "rfq_cancelled",
            Self::BidAwarded => "bid_awarded",
            Self::BidRejected => "bid_rejected",
            Self::PurchaseOrderIssued => "purchase_order_issued",
            Self::PurchaseOrderApproved => "purchase_order_approved",
        }
    }
}

/// A templated email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailRequest {
    /// Template.
    pub email_type: EmailType,
    /// Addressee.
    pub recipient: Recipient,
    /// Template variables.
    pub data: Value,
}

/// A message for live subscribers of a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastMessage {
    /// Channel name, e.g. `negotiation:<id>`.
    pub channel: String,
    /// Event name.
    pub event: String,
    /// JSON payload.
    pub payload: Value,
}

impl BroadcastMessage {
    /// Channel carrying live updates for one negotiation.
    #[must_use]
    pub fn negotiation_channel(negotiation_id: Uuid) -> String {
        format!("negotiation:{negotiation_id}")
    }
}

/// Persists in-app notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Stores one notification.
    async fn create_notification(&self, notification: NewNotification) -> Result<(), NotifyError>;
}

/// Sends templated emails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSink: Send + Sync {
    /// Renders and sends one email.
    async fn send_email_by_type(&self, request: EmailRequest) -> Result<(), NotifyError>;
}

/// Pushes messages to live subscribers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publishes one message. Having no subscribers is not an error.
    async fn publish(&self, message: BroadcastMessage) -> Result<(), NotifyError>;
}

/// Resolves recipients to email addresses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Addresses for a user or every contact of a company.
    async fn email_for(&self, recipient: Recipient) -> Result<Vec<String>, NotifyError>;
}

/// Sink that drops everything. Used when a channel is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), NotifyError> {
        tracing::debug!(
            notification_type = notification.notification_type.as_str(),
            "notification sink disabled"
        );
        Ok(())
    }
}

#[async_trait]
impl EmailSink for NoopSink {
    async fn send_email_by_type(&self, request: EmailRequest) -> Result<(), NotifyError> {
        tracing::debug!(email_type = request.email_type.as_str(), "email sink disabled");
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for NoopSink {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), NotifyError> {
        tracing::debug!(channel = %message.channel, "broadcaster disabled");
        Ok(())
    }
}
