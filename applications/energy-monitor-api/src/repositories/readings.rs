use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct EnergyReading {
    pub id: i64,
    pub home_id: i64,
    pub user_id: String,
    pub appliance_id: i64,
    pub room_id: Option<i64>,
    pub energy_kwh: f64,
    pub power_w: f64,
    pub current_a: f64,
    pub voltage_v: f64,
    pub cost: f64,
    pub recorded_at: DateTime<Utc>,
    pub is_on: bool,
    pub is_randomized: bool,
    pub created_at: DateTime<Utc>,
}

impl EnergyReading {
    pub fn scope(&self) -> ReadingScope {
        ReadingScope {
            home_id: self.home_id,
            user_id: self.user_id.clone(),
            appliance_id: Some(self.appliance_id),
            room_id: self.room_id,
        }
    }
}

/// A validated reading with its derived cost, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub home_id: i64,
    pub user_id: String,
    pub appliance_id: i64,
    pub room_id: Option<i64>,
    pub energy_kwh: f64,
    pub power_w: f64,
    pub current_a: f64,
    pub voltage_v: f64,
    pub cost: f64,
    pub recorded_at: DateTime<Utc>,
    pub is_on: bool,
    pub is_randomized: bool,
}

/// The (home, user, appliance, room) tuple readings and summaries are grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadingScope {
    pub home_id: i64,
    pub user_id: String,
    pub appliance_id: Option<i64>,
    pub room_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub home_id: i64,
    pub appliance_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
}

/// Append-only reading log.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert(&self, reading: &NewReading) -> Result<EnergyReading>;

    /// Readings of exactly this scope with `start <= recorded_at <= end`.
    async fn find_in_window(
        &self,
        scope: &ReadingScope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EnergyReading>>;

    /// Every reading tagged with `room_id`, oldest first.
    async fn find_by_room(&self, room_id: i64) -> Result<Vec<EnergyReading>>;

    /// Newest first.
    async fn list(&self, filter: &ReadingFilter) -> Result<Vec<EnergyReading>>;
}

#[derive(Debug, Clone)]
pub struct ReadingsRepository {
    pool: PgPool,
}

impl ReadingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for ReadingsRepository {
    async fn insert(&self, reading: &NewReading) -> Result<EnergyReading> {
        let inserted = sqlx::query_as::<_, EnergyReading>(
            r#"
            INSERT INTO energy_readings (
                home_id, user_id, appliance_id, room_id,
                energy_kwh, power_w, current_a, voltage_v, cost,
                recorded_at, is_on, is_randomized, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            RETURNING *
            "#,
        )
        .bind(reading.home_id)
        .bind(&reading.user_id)
        .bind(reading.appliance_id)
        .bind(reading.room_id)
        .bind(reading.energy_kwh)
        .bind(reading.power_w)
        .bind(reading.current_a)
        .bind(reading.voltage_v)
        .bind(reading.cost)
        .bind(reading.recorded_at)
        .bind(reading.is_on)
        .bind(reading.is_randomized)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn find_in_window(
        &self,
        scope: &ReadingScope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EnergyReading>> {
        let readings = sqlx::query_as::<_, EnergyReading>(
            r#"
            SELECT * FROM energy_readings
            WHERE home_id = $1
              AND user_id = $2
              AND appliance_id IS NOT DISTINCT FROM $3
              AND room_id IS NOT DISTINCT FROM $4
              AND recorded_at >= $5
              AND recorded_at <= $6
            ORDER BY recorded_at
            "#,
        )
        .bind(scope.home_id)
        .bind(&scope.user_id)
        .bind(scope.appliance_id)
        .bind(scope.room_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    async fn find_by_room(&self, room_id: i64) -> Result<Vec<EnergyReading>> {
        let readings = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_readings WHERE room_id = $1 ORDER BY recorded_at",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    async fn list(&self, filter: &ReadingFilter) -> Result<Vec<EnergyReading>> {
        let readings = sqlx::query_as::<_, EnergyReading>(
            r#"
            SELECT * FROM energy_readings
            WHERE home_id = $1
              AND ($2::BIGINT IS NULL OR appliance_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR recorded_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR recorded_at <= $4)
            ORDER BY recorded_at DESC
            LIMIT $5
            "#,
        )
        .bind(filter.home_id)
        .bind(filter.appliance_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }
}
