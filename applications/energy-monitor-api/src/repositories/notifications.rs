use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::str::FromStr;

use crate::error::{ParseEnumError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NotificationChannel {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "in-app")]
    InApp,
    #[serde(rename = "push")]
    Push,
    /// Marker channel carried by monthly bill reminders.
    #[serde(rename = "bill_reminder")]
    BillReminder,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::InApp => "in-app",
            NotificationChannel::Push => "push",
            NotificationChannel::BillReminder => "bill_reminder",
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "email" => Ok(NotificationChannel::Email),
            "in-app" => Ok(NotificationChannel::InApp),
            "push" => Ok(NotificationChannel::Push),
            "bill_reminder" => Ok(NotificationChannel::BillReminder),
            other => Err(ParseEnumError::new("notification channel", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Acknowledged,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Acknowledged => "acknowledged",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            "acknowledged" => Ok(NotificationStatus::Acknowledged),
            other => Err(ParseEnumError::new("notification status", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub home_id: Option<i64>,
    pub anomaly_alert_id: Option<i64>,
    pub channels: Vec<NotificationChannel>,
    pub message: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub dedupe_key: Option<String>,
}

impl Notification {
    pub fn has_channel(&self, channel: NotificationChannel) -> bool {
        self.channels.contains(&channel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub home_id: Option<i64>,
    pub anomaly_alert_id: Option<i64>,
    pub channels: Vec<NotificationChannel>,
    pub message: String,
    pub due_date: Option<DateTime<Utc>>,
    /// Notifications sharing a key are created at most once.
    pub dedupe_key: Option<String>,
}

fn decode_err(index: &str, e: ParseEnumError) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: index.into(),
        source: Box::new(e),
    }
}

impl<'r> FromRow<'r, PgRow> for Notification {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let channels: Vec<String> = row.try_get("channels")?;
        let channels = channels
            .iter()
            .map(|c| c.parse::<NotificationChannel>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| decode_err("channels", e))?;
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<NotificationStatus>()
            .map_err(|e| decode_err("status", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            home_id: row.try_get("home_id")?,
            anomaly_alert_id: row.try_get("anomaly_alert_id")?,
            channels,
            message: row.try_get("message")?,
            status,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
            due_date: row.try_get("due_date")?,
            dedupe_key: row.try_get("dedupe_key")?,
        })
    }
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert unless a notification with the same `dedupe_key` exists.
    ///
    /// Returns `None` when the insert was suppressed. Check and insert happen
    /// in one atomic step.
    async fn insert_if_absent(&self, notification: &NewNotification)
        -> Result<Option<Notification>>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<Notification>>;

    async fn get(&self, id: i64) -> Result<Option<Notification>>;

    async fn set_status(
        &self,
        id: i64,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Notification>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct NotificationsRepository {
    pool: PgPool,
}

impl NotificationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationsRepository {
    async fn insert_if_absent(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>> {
        let channels: Vec<String> = notification
            .channels
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        let inserted = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                user_id, home_id, anomaly_alert_id, channels, message,
                status, created_at, due_date, dedupe_key
            ) VALUES ($1, $2, $3, $4, $5, 'pending', NOW(), $6, $7)
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&notification.user_id)
        .bind(notification.home_id)
        .bind(notification.anomaly_alert_id)
        .bind(channels)
        .bind(&notification.message)
        .bind(notification.due_date)
        .bind(&notification.dedupe_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    async fn set_status(
        &self,
        id: i64,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET status = $2, sent_at = COALESCE($3, sent_at)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(sent_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
