//! Adapters behind the core notification ports: live negotiation channels
//! and SMTP email.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use procura_core::notify::{
    BroadcastMessage, Broadcaster, ContactDirectory, EmailRequest, EmailSink, EmailType,
    NotifyError,
};
use procura_shared::EmailService;

const CHANNEL_CAPACITY: usize = 200;

/// In-process publish/subscribe channels, one per negotiation.
#[derive(Debug, Default)]
pub struct SseBroadcaster {
    channels: RwLock<HashMap<String, broadcast::Sender<BroadcastMessage>>>,
}

impl SseBroadcaster {
    /// Creates an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `channel`, creating it on first use. Channels whose
    /// subscribers have all gone away are dropped here.
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<BroadcastMessage> {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        if channels.len() < before {
            tracing::debug!(pruned = before - channels.len(), "closed idle broadcast channels");
        }
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of open channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[async_trait]
impl Broadcaster for SseBroadcaster {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), NotifyError> {
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(&message.channel) else {
            return Ok(());
        };
        let channel = message.channel.clone();
        if sender.send(message).is_err() {
            // Every subscriber went away.
            channels.remove(&channel);
            tracing::debug!(%channel, "closed idle broadcast channel");
        }
        Ok(())
    }
}

/// Renders workflow emails and sends them over SMTP.
pub struct SmtpEmailSink {
    email: EmailService,
    contacts: Arc<dyn ContactDirectory>,
}

impl SmtpEmailSink {
    /// Creates a sink resolving addresses through `contacts`.
    pub fn new(email: EmailService, contacts: Arc<dyn ContactDirectory>) -> Self {
        Self { email, contacts }
    }
}

#[async_trait]
impl EmailSink for SmtpEmailSink {
    async fn send_email_by_type(&self, request: EmailRequest) -> Result<(), NotifyError> {
        let addresses = self.contacts.email_for(request.recipient).await?;
        let (subject, body) = render(request.email_type, &request.data, self.email.frontend_url());

        for address in &addresses {
            self.email
                .send_email(address, &subject, &body)
                .await
                .map_err(|e| NotifyError::Email(e.to_string()))?;
        }
        tracing::info!(
            email_type = request.email_type.as_str(),
            recipients = addresses.len(),
            "workflow email sent"
        );
        Ok(())
    }
}

fn text<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| data.get(*key).and_then(Value::as_str))
}

/// Subject and plain-text body for an email.
#[must_use]
pub fn render(email_type: EmailType, data: &Value, frontend_url: &str) -> (String, String) {
    let reference = text(data, &["reference", "rfq_number", "po_number"]).unwrap_or("(unnumbered)");
    let reason = text(data, &["reason"])
        .map(|r| format!("\n\nReason: {r}"))
        .unwrap_or_default();
    let link = format!("\n\nOpen Procura: {}", frontend_url.trim_end_matches('/'));

    let (subject, lead) = match email_type {
        EmailType::RfqInvitation => {
            let title = text(data, &["title"]).unwrap_or_default();
            (
                format!("Invitation to bid: {reference}"),
                format!("Your company has been invited to bid on {reference} \"{title}\"."),
            )
        }
        EmailType::RfqCancelled => (
            format!("{reference} was cancelled"),
            format!("The request for quotation {reference} has been cancelled.{reason}"),
        ),
        EmailType::BidAwarded => (
            format!("Your bid {reference} was awarded"),
            format!("Congratulations, your bid {reference} has been awarded."),
        ),
        EmailType::BidRejected => (
            format!("Update on your bid {reference}"),
            format!("Your bid {reference} was not selected.{reason}"),
        ),
        EmailType::PurchaseOrderIssued => {
            let total = match (text(data, &["total_amount"]), text(data, &["currency"])) {
                (Some(amount), Some(currency)) => format!(" for {amount} {currency}"),
                _ => String::new(),
            };
            (
                format!("Purchase order {reference}"),
                format!("Purchase order {reference}{total} has been issued to your company."),
            )
        }
        EmailType::PurchaseOrderApproved => (
            format!("Purchase order {reference} approved"),
            format!("Purchase order {reference} has been approved."),
        ),
    };
    (subject, format!("{lead}{link}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::events::Recipient;
    use procura_shared::EmailConfig;
    use serde_json::json;
    use uuid::Uuid;

    struct EmptyDirectory;

    #[async_trait]
    impl ContactDirectory for EmptyDirectory {
        async fn email_for(&self, recipient: Recipient) -> Result<Vec<String>, NotifyError> {
            Err(NotifyError::NoAddress(recipient))
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_messages() {
        let broadcaster = SseBroadcaster::new();
        let channel = BroadcastMessage::negotiation_channel(Uuid::new_v4());
        let mut rx = broadcaster.subscribe(&channel).await;

        broadcaster
            .publish(BroadcastMessage {
                channel: channel.clone(),
                event: "message_sent".to_string(),
                payload: json!({ "message_type": "counter_offer" }),
            })
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "message_sent");
        assert_eq!(received.payload["message_type"], "counter_offer");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broadcaster = SseBroadcaster::new();
        let channel = BroadcastMessage::negotiation_channel(Uuid::new_v4());
        let rx = broadcaster.subscribe(&channel).await;
        drop(rx);

        let message = BroadcastMessage {
            channel,
            event: "status_changed".to_string(),
            payload: Value::Null,
        };
        assert!(broadcaster.publish(message).await.is_ok());
        assert_eq!(broadcaster.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_abandoned_channels_are_pruned_on_subscribe() {
        let broadcaster = SseBroadcaster::new();
        let abandoned = broadcaster
            .subscribe(&BroadcastMessage::negotiation_channel(Uuid::new_v4()))
            .await;
        drop(abandoned);

        let _live = broadcaster
            .subscribe(&BroadcastMessage::negotiation_channel(Uuid::new_v4()))
            .await;
        assert_eq!(broadcaster.channel_count().await, 1);
    }

    #[test]
    fn test_render_purchase_order_email() {
        let data = json!({
            "event": "purchase_order_created",
            "po_number": "PO-2026-0007",
            "total_amount": "450.00",
            "currency": "EUR"
        });
        let (subject, body) = render(EmailType::PurchaseOrderIssued, &data, "https://app.test/");
        assert_eq!(subject, "Purchase order PO-2026-0007");
        assert!(body.contains("for 450.00 EUR"));
        assert!(body.ends_with("Open Procura: https://app.test"));
    }

    #[test]
    fn test_render_rejection_includes_reason() {
        let data = json!({ "reference": "BID-2026-0002", "reason": "Price too high" });
        let (_, body) = render(EmailType::BidRejected, &data, "http://localhost:3000");
        assert!(body.contains("Reason: Price too high"));
    }

    #[tokio::test]
    async fn test_unknown_recipient_fails_before_smtp() {
        let sink = SmtpEmailSink::new(
            EmailService::new(EmailConfig::default()),
            Arc::new(EmptyDirectory),
        );

        let err = sink
            .send_email_by_type(EmailRequest {
                email_type: EmailType::BidAwarded,
                recipient: Recipient::Company(Uuid::new_v4()),
                data: json!({ "reference": "BID-2026-0001" }),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NoAddress(_)));
    }
}
