//! Maps domain events to the deliveries they cause.

use serde_json::{Value, json};

use super::ports::{BroadcastMessage, EmailRequest, EmailType, NewNotification, NotificationType};
use crate::events::{DomainEvent, Recipient, StatusChanged};
use crate::machine::EntityKind;

/// Everything one event should produce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryPlan {
    /// In-app notifications.
    pub notifications: Vec<NewNotification>,
    /// Emails.
    pub emails: Vec<EmailRequest>,
    /// Live broadcasts.
    pub broadcasts: Vec<BroadcastMessage>,
}

impl DeliveryPlan {
    /// Returns true if the plan delivers nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.emails.is_empty() && self.broadcasts.is_empty()
    }
}

fn label(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::Rfq => "RFQ",
        EntityKind::Bid => "Bid",
        EntityKind::Negotiation => "Negotiation",
        EntityKind::NegotiationMessage => "Message",
        EntityKind::PurchaseOrder => "Purchase order",
        EntityKind::PurchaseOrderModification => "Modification",
    }
}

fn payload(event: &DomainEvent) -> Value {
    serde_json::to_value(event).unwrap_or(Value::Null)
}

/// Builds the delivery plan for one event.
#[must_use]
pub fn plan(event: &DomainEvent) -> DeliveryPlan {
    match event {
        DomainEvent::StatusChanged(change) => status_changed(change, event),

        DomainEvent::SupplierInvited {
            rfq_id,
            rfq_number,
            title,
            supplier_company_id,
            ..
        } => {
            let recipient = Recipient::Company(*supplier_company_id);
            DeliveryPlan {
                notifications: vec![NewNotification {
                    notification_type: NotificationType::RfqInvitation,
                    title: format!("Invitation to bid on {rfq_number}"),
                    message: format!("You have been invited to bid on \"{title}\"."),
                    recipient,
                    related_user_id: None,
                    related_entity_id: *rfq_id,
                    related_entity_type: EntityKind::Rfq,
                }],
                emails: vec![EmailRequest {
                    email_type: EmailType::RfqInvitation,
                    recipient,
                    data: payload(event),
                }],
                broadcasts: Vec::new(),
            }
        }

        DomainEvent::MessageSent {
            negotiation_id,
            message_type,
            sender_id,
            recipient_id,
            ..
        } => DeliveryPlan {
            notifications: vec![NewNotification {
                notification_type: NotificationType::NegotiationMessage,
                title: "New negotiation message".to_string(),
                message: format!("A new {} was posted.", message_type.as_str().replace('_', " ")),
                recipient: Recipient::User(*recipient_id),
                related_user_id: Some(*sender_id),
                related_entity_id: *negotiation_id,
                related_entity_type: EntityKind::Negotiation,
            }],
            emails: Vec::new(),
            broadcasts: vec![BroadcastMessage {
                channel: BroadcastMessage::negotiation_channel(*negotiation_id),
                event: event.name().to_string(),
                payload: payload(event),
            }],
        },

        DomainEvent::PurchaseOrderCreated {
            purchase_order_id,
            po_number,
            status,
            buyer_company_id,
            supplier_company_id,
            ..
        } => {
            let issued = status == "sent_to_supplier";
            let recipient = if issued {
                Recipient::Company(*supplier_company_id)
            } else {
                Recipient::Company(*buyer_company_id)
            };
            let message = if issued {
                format!("Purchase order {po_number} has been issued to you.")
            } else {
                format!("Purchase order {po_number} is awaiting approval.")
            };
            DeliveryPlan {
                notifications: vec![NewNotification {
                    notification_type: NotificationType::PurchaseOrderStatusChanged,
                    title: format!("Purchase order {po_number} created"),
                    message,
                    recipient,
                    related_user_id: None,
                    related_entity_id: *purchase_order_id,
                    related_entity_type: EntityKind::PurchaseOrder,
                }],
                emails: if issued {
                    vec![EmailRequest {
                        email_type: EmailType::PurchaseOrderIssued,
                        recipient,
                        data: payload(event),
                    }]
                } else {
                    Vec::new()
                },
                broadcasts: Vec::new(),
            }
        }

        DomainEvent::ModificationChanged {
            purchase_order_id,
            po_number,
            field,
            status,
            recipients,
            ..
        } => DeliveryPlan {
            notifications: recipients
                .iter()
                .map(|recipient| NewNotification {
                    notification_type: NotificationType::PurchaseOrderModification,
                    title: format!("Change to {po_number}"),
                    message: format!("Modification of {field} is {}.", status.as_str()),
                    recipient: *recipient,
                    related_user_id: None,
                    related_entity_id: *purchase_order_id,
                    related_entity_type: EntityKind::PurchaseOrder,
                })
                .collect(),
            emails: Vec::new(),
            broadcasts: Vec::new(),
        },
    }
}

fn status_changed(change: &StatusChanged, event: &DomainEvent) -> DeliveryPlan {
    let notification_type = match change.entity {
        EntityKind::Rfq => NotificationType::RfqStatusChanged,
        EntityKind::Bid => NotificationType::BidStatusChanged,
        EntityKind::Negotiation | EntityKind::NegotiationMessage => {
            NotificationType::NegotiationStatusChanged
        }
        EntityKind::PurchaseOrder | EntityKind::PurchaseOrderModification => {
            NotificationType::PurchaseOrderStatusChanged
        }
    };
    let to = change.to.replace('_', " ");
    let mut message = format!(
        "{} {} moved from {} to {to}.",
        label(change.entity),
        change.reference,
        change.from.replace('_', " ")
    );
    if let Some(reason) = &change.reason {
        message.push_str(" Reason: ");
        message.push_str(reason);
    }

    let notifications = change
        .recipients
        .iter()
        .map(|recipient| NewNotification {
            notification_type,
            title: format!("{} {} is now {to}", label(change.entity), change.reference),
            message: message.clone(),
            recipient: *recipient,
            related_user_id: Some(change.actor_id),
            related_entity_id: change.entity_id,
            related_entity_type: change.entity,
        })
        .collect();

    let email_type = match (change.entity, change.to.as_str()) {
        (EntityKind::Rfq, "cancelled") => Some(EmailType::RfqCancelled),
        (EntityKind::Bid, "awarded") => Some(EmailType::BidAwarded),
        (EntityKind::Bid, "rejected") => Some(EmailType::BidRejected),
        (EntityKind::PurchaseOrder, "sent_to_supplier") => Some(EmailType::PurchaseOrderIssued),
        (EntityKind::PurchaseOrder, "approved") => Some(EmailType::PurchaseOrderApproved),
        _ => None,
    };
    let emails = email_type
        .map(|email_type| {
            change
                .recipients
                .iter()
                .map(|recipient| EmailRequest {
                    email_type,
                    recipient: *recipient,
                    data: payload(event),
                })
                .collect()
        })
        .unwrap_or_default();

    let broadcasts = if change.entity == EntityKind::Negotiation {
        vec![BroadcastMessage {
            channel: BroadcastMessage::negotiation_channel(change.entity_id),
            event: event.name().to_string(),
            payload: json!({ "status": change.to, "reason": change.reason }),
        }]
    } else {
        Vec::new()
    };

    DeliveryPlan {
        notifications,
        emails,
        broadcasts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::MessageType;
    use uuid::Uuid;

    fn changed(entity: EntityKind, to: &str, recipients: Vec<Recipient>) -> DomainEvent {
        DomainEvent::StatusChanged(StatusChanged {
            entity,
            entity_id: Uuid::new_v4(),
            reference: "REF-1".to_string(),
            from: "draft".to_string(),
            to: to.to_string(),
            actor_id: Uuid::new_v4(),
            forced: false,
            reason: Some("Budget cut".to_string()),
            recipients,
        })
    }

    #[test]
    fn test_rfq_cancel_notifies_and_emails_every_recipient() {
        let recipients = vec![
            Recipient::Company(Uuid::new_v4()),
            Recipient::Company(Uuid::new_v4()),
        ];
        let plan = plan(&changed(EntityKind::Rfq, "cancelled", recipients));
        assert_eq!(plan.notifications.len(), 2);
        assert_eq!(plan.emails.len(), 2);
        assert!(plan.emails.iter().all(|e| e.email_type == EmailType::RfqCancelled));
        assert!(plan.notifications[0].message.contains("Budget cut"));
        assert!(plan.broadcasts.is_empty());
    }

    #[test]
    fn test_status_change_without_recipients_is_empty() {
        assert!(plan(&changed(EntityKind::Bid, "withdrawn", Vec::new())).is_empty());
    }

    #[test]
    fn test_negotiation_status_is_broadcast() {
        let event = changed(
            EntityKind::Negotiation,
            "cancelled",
            vec![Recipient::User(Uuid::new_v4())],
        );
        let DomainEvent::StatusChanged(change) = &event else {
            unreachable!()
        };
        let plan = plan(&event);
        assert_eq!(plan.broadcasts.len(), 1);
        assert_eq!(
            plan.broadcasts[0].channel,
            format!("negotiation:{}", change.entity_id)
        );
    }

    #[test]
    fn test_message_goes_to_counterpart_and_channel() {
        let negotiation_id = Uuid::new_v4();
        let recipient_id = Uuid::new_v4();
        let plan = plan(&DomainEvent::MessageSent {
            negotiation_id,
            message_id: Uuid::new_v4(),
            bid_id: Uuid::new_v4(),
            message_type: MessageType::CounterOffer,
            sender_id: Uuid::new_v4(),
            recipient_id,
            negotiation_status: "active".to_string(),
        });
        assert_eq!(plan.notifications[0].recipient, Recipient::User(recipient_id));
        assert_eq!(plan.broadcasts[0].event, "message_sent");
        assert_eq!(plan.broadcasts[0].payload["message_type"], "counter_offer");
        assert!(plan.emails.is_empty());
    }

    #[test]
    fn test_issued_order_emails_supplier() {
        let supplier = Uuid::new_v4();
        let plan = plan(&DomainEvent::PurchaseOrderCreated {
            purchase_order_id: Uuid::new_v4(),
            po_number: "PO-2026-0001".to_string(),
            status: "sent_to_supplier".to_string(),
            buyer_company_id: Uuid::new_v4(),
            supplier_company_id: supplier,
            total_amount: rust_decimal::Decimal::ONE_HUNDRED,
            currency: "USD".to_string(),
        });
        assert_eq!(plan.emails[0].email_type, EmailType::PurchaseOrderIssued);
        assert_eq!(plan.emails[0].recipient, Recipient::Company(supplier));
    }
}
