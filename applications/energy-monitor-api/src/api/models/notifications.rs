use serde::{Deserialize, Serialize};

pub use crate::repositories::notifications::{Notification, NotificationStatus};

#[derive(Debug, Deserialize, Default)]
pub struct NotificationsQuery {
    pub status: Option<NotificationStatus>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub notifications: Vec<Notification>,
}
