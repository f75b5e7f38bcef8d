use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Home {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HomeCreate {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Room {
    pub id: i64,
    pub home_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomCreate {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Appliance {
    pub id: i64,
    pub home_id: i64,
    pub room_id: Option<i64>,
    pub name: String,
    pub rated_power_w: Option<f64>,
    #[serde(skip_serializing)]
    pub device_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplianceCreate {
    pub name: String,
    pub room_id: Option<i64>,
    pub rated_power_w: Option<f64>,
    /// Shared secret a metering device presents when posting readings.
    pub device_key: Option<String>,
}

/// Homes and the rooms and appliances inside them.
///
/// Deleting a home removes everything that hangs off it, readings and
/// summaries included. Deleting a room detaches its appliances and readings
/// and drops the room's summaries.
#[async_trait]
pub trait HomeStore: Send + Sync {
    async fn create_home(&self, user_id: &str, create: &HomeCreate) -> Result<Home>;
    async fn list_homes(&self, user_id: &str) -> Result<Vec<Home>>;
    async fn get_home(&self, id: i64) -> Result<Option<Home>>;
    async fn delete_home(&self, id: i64) -> Result<bool>;

    async fn create_room(&self, home_id: i64, create: &RoomCreate) -> Result<Room>;
    async fn list_rooms(&self, home_id: i64) -> Result<Vec<Room>>;
    async fn get_room(&self, id: i64) -> Result<Option<Room>>;
    async fn delete_room(&self, id: i64) -> Result<bool>;

    async fn create_appliance(&self, home_id: i64, create: &ApplianceCreate) -> Result<Appliance>;
    async fn list_appliances(&self, home_id: i64) -> Result<Vec<Appliance>>;
    async fn get_appliance(&self, id: i64) -> Result<Option<Appliance>>;
    async fn find_appliance_by_device_key(&self, device_key: &str) -> Result<Option<Appliance>>;
    async fn delete_appliance(&self, id: i64) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct HomesRepository {
    pool: PgPool,
}

impl HomesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HomeStore for HomesRepository {
    async fn create_home(&self, user_id: &str, create: &HomeCreate) -> Result<Home> {
        let home = sqlx::query_as::<_, Home>(
            r#"
            INSERT INTO homes (user_id, name, address, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_id, name, address, created_at
            "#,
        )
        .bind(user_id)
        .bind(&create.name)
        .bind(&create.address)
        .fetch_one(&self.pool)
        .await?;

        Ok(home)
    }

    async fn list_homes(&self, user_id: &str) -> Result<Vec<Home>> {
        let homes = sqlx::query_as::<_, Home>(
            r#"
            SELECT id, user_id, name, address, created_at
            FROM homes
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(homes)
    }

    async fn get_home(&self, id: i64) -> Result<Option<Home>> {
        let home = sqlx::query_as::<_, Home>(
            r#"
            SELECT id, user_id, name, address, created_at
            FROM homes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(home)
    }

    async fn delete_home(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM homes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_room(&self, home_id: i64, create: &RoomCreate) -> Result<Room> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (home_id, name, created_at)
            VALUES ($1, $2, NOW())
            RETURNING id, home_id, name, created_at
            "#,
        )
        .bind(home_id)
        .bind(&create.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(room)
    }

    async fn list_rooms(&self, home_id: i64) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, home_id, name, created_at
            FROM rooms
            WHERE home_id = $1
            ORDER BY name
            "#,
        )
        .bind(home_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rooms)
    }

    async fn get_room(&self, id: i64) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT id, home_id, name, created_at FROM rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    async fn delete_room(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_appliance(&self, home_id: i64, create: &ApplianceCreate) -> Result<Appliance> {
        let appliance = sqlx::query_as::<_, Appliance>(
            r#"
            INSERT INTO appliances (home_id, room_id, name, rated_power_w, device_key, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, home_id, room_id, name, rated_power_w, device_key, created_at
            "#,
        )
        .bind(home_id)
        .bind(create.room_id)
        .bind(&create.name)
        .bind(create.rated_power_w)
        .bind(&create.device_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(appliance)
    }

    async fn list_appliances(&self, home_id: i64) -> Result<Vec<Appliance>> {
        let appliances = sqlx::query_as::<_, Appliance>(
            r#"
            SELECT id, home_id, room_id, name, rated_power_w, device_key, created_at
            FROM appliances
            WHERE home_id = $1
            ORDER BY name
            "#,
        )
        .bind(home_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(appliances)
    }

    async fn get_appliance(&self, id: i64) -> Result<Option<Appliance>> {
        let appliance = sqlx::query_as::<_, Appliance>(
            r#"
            SELECT id, home_id, room_id, name, rated_power_w, device_key, created_at
            FROM appliances
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(appliance)
    }

    async fn find_appliance_by_device_key(&self, device_key: &str) -> Result<Option<Appliance>> {
        let appliance = sqlx::query_as::<_, Appliance>(
            r#"
            SELECT id, home_id, room_id, name, rated_power_w, device_key, created_at
            FROM appliances
            WHERE device_key = $1
            "#,
        )
        .bind(device_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(appliance)
    }

    async fn delete_appliance(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM appliances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
