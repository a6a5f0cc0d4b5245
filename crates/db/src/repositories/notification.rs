//! Persisted notifications and the contact directory.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use procura_core::events::Recipient;
use procura_core::notify::{ContactDirectory, NewNotification, NotificationSink, NotifyError};

use super::workflow::PgStore;
use crate::entities::{company_contacts, notifications};

#[async_trait]
impl NotificationSink for PgStore {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), NotifyError> {
        let (recipient_user_id, recipient_company_id) = match notification.recipient {
            Recipient::User(id) => (Some(id), None),
            Recipient::Company(id) => (None, Some(id)),
        };
        let row = notifications::ActiveModel {
            id: Set(Uuid::new_v4()),
            notification_type: Set(notification.notification_type.as_str().to_string()),
            title: Set(notification.title),
            message: Set(notification.message),
            recipient_user_id: Set(recipient_user_id),
            recipient_company_id: Set(recipient_company_id),
            related_user_id: Set(notification.related_user_id),
            related_entity_id: Set(notification.related_entity_id),
            related_entity_type: Set(notification.related_entity_type.as_str().to_string()),
            read_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        notifications::Entity::insert(row)
            .exec_without_returning(self.connection())
            .await
            .map_err(|e| NotifyError::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ContactDirectory for PgStore {
    async fn email_for(&self, recipient: Recipient) -> Result<Vec<String>, NotifyError> {
        let query = match recipient {
            Recipient::User(id) => {
                company_contacts::Entity::find().filter(company_contacts::Column::UserId.eq(id))
            }
            Recipient::Company(id) => {
                company_contacts::Entity::find().filter(company_contacts::Column::CompanyId.eq(id))
            }
        };
        let contacts = query
            .order_by_asc(company_contacts::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| NotifyError::Store(e.to_string()))?;

        let mut emails: Vec<String> = contacts.into_iter().map(|c| c.email).collect();
        emails.dedup();
        if emails.is_empty() {
            return Err(NotifyError::NoAddress(recipient));
        }
        Ok(emails)
    }
}
