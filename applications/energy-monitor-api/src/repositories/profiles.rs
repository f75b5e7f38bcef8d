use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::Result;

/// Notification preferences of a user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Profile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub in_app_notifications: bool,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Preferences reported for a user who never saved any.
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: None,
            email_notifications: true,
            push_notifications: false,
            in_app_notifications: true,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub in_app_notifications: Option<bool>,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Apply the fields present in `update`, creating the profile if needed.
    async fn upsert(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile>;
}

#[derive(Debug, Clone)]
pub struct ProfilesRepository {
    pool: PgPool,
}

impl ProfilesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfilesRepository {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, display_name, email_notifications, push_notifications,
                   in_app_notifications, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn upsert(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (
                user_id, display_name, email_notifications, push_notifications,
                in_app_notifications, updated_at
            ) VALUES ($1, $2, COALESCE($3, TRUE), COALESCE($4, FALSE), COALESCE($5, TRUE), NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = COALESCE($2, profiles.display_name),
                email_notifications = COALESCE($3, profiles.email_notifications),
                push_notifications = COALESCE($4, profiles.push_notifications),
                in_app_notifications = COALESCE($5, profiles.in_app_notifications),
                updated_at = NOW()
            RETURNING user_id, display_name, email_notifications, push_notifications,
                      in_app_notifications, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&update.display_name)
        .bind(update.email_notifications)
        .bind(update.push_notifications)
        .bind(update.in_app_notifications)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }
}
