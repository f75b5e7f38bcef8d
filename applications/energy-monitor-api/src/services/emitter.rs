use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::repositories::notifications::{Notification, NotificationStatus};
use crate::repositories::NotificationStore;

/// Delivers an already persisted notification.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    /// Returns the notification as stored after delivery.
    async fn emit(&self, notification: &Notification) -> Result<Notification>;
}

/// Stands in for mail and push transports: logs the delivery and marks the
/// notification as sent.
pub struct StatusEmitter {
    notifications: Arc<dyn NotificationStore>,
}

impl StatusEmitter {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl NotificationEmitter for StatusEmitter {
    async fn emit(&self, notification: &Notification) -> Result<Notification> {
        let channels: Vec<&str> = notification.channels.iter().map(|c| c.as_str()).collect();
        tracing::info!(
            notification_id = notification.id,
            user_id = %notification.user_id,
            channels = ?channels,
            "delivering notification"
        );

        self.notifications
            .set_status(notification.id, NotificationStatus::Sent, Some(Utc::now()))
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Notification {} not found", notification.id))
            })
    }
}
