use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};

use crate::error::Result;
use crate::periods::PeriodType;
use crate::repositories::readings::ReadingScope;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EnergySummary {
    pub id: i64,
    pub home_id: i64,
    pub user_id: String,
    pub appliance_id: Option<i64>,
    pub room_id: Option<i64>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub period_type: PeriodType,
    pub total_energy_kwh: f64,
    pub avg_power_w: f64,
    pub total_cost: f64,
    pub reading_count: i64,
    pub active_time_percentage: f64,
    pub updated_at: DateTime<Utc>,
}

/// Values recomputed from the readings of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SummaryTotals {
    pub total_energy_kwh: f64,
    pub avg_power_w: f64,
    pub total_cost: f64,
    pub reading_count: i64,
    pub active_time_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryUpsert {
    pub scope: ReadingScope,
    pub period_type: PeriodType,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub totals: SummaryTotals,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub home_id: i64,
    pub period_type: Option<PeriodType>,
    pub appliance_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for EnergySummary {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let period_type: String = row.try_get("period_type")?;
        let period_type = period_type
            .parse::<PeriodType>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "period_type".into(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            home_id: row.try_get("home_id")?,
            user_id: row.try_get("user_id")?,
            appliance_id: row.try_get("appliance_id")?,
            room_id: row.try_get("room_id")?,
            period_start: row.try_get("period_start")?,
            period_end: row.try_get("period_end")?,
            period_type,
            total_energy_kwh: row.try_get("total_energy_kwh")?,
            avg_power_w: row.try_get("avg_power_w")?,
            total_cost: row.try_get("total_cost")?,
            reading_count: row.try_get("reading_count")?,
            active_time_percentage: row.try_get("active_time_percentage")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Period summaries. `upsert` is the only write path.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Create or overwrite the summary keyed by scope, period bounds and type.
    async fn upsert(&self, summary: &SummaryUpsert) -> Result<EnergySummary>;

    /// Monthly summaries ending exactly at `period_end` with a positive cost.
    async fn find_billable_monthly(&self, period_end: DateTime<Utc>) -> Result<Vec<EnergySummary>>;

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<EnergySummary>>;
}

#[derive(Debug, Clone)]
pub struct SummariesRepository {
    pool: PgPool,
}

impl SummariesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for SummariesRepository {
    async fn upsert(&self, summary: &SummaryUpsert) -> Result<EnergySummary> {
        let totals = &summary.totals;
        let stored = sqlx::query_as::<_, EnergySummary>(
            r#"
            INSERT INTO energy_summaries (
                home_id, user_id, appliance_id, room_id,
                period_start, period_end, period_type,
                total_energy_kwh, avg_power_w, total_cost, reading_count,
                active_time_percentage, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            ON CONFLICT (
                home_id, user_id, COALESCE(appliance_id, 0), COALESCE(room_id, 0),
                period_start, period_end, period_type
            ) DO UPDATE SET
                total_energy_kwh = EXCLUDED.total_energy_kwh,
                avg_power_w = EXCLUDED.avg_power_w,
                total_cost = EXCLUDED.total_cost,
                reading_count = EXCLUDED.reading_count,
                active_time_percentage = EXCLUDED.active_time_percentage,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(summary.scope.home_id)
        .bind(&summary.scope.user_id)
        .bind(summary.scope.appliance_id)
        .bind(summary.scope.room_id)
        .bind(summary.period_start)
        .bind(summary.period_end)
        .bind(summary.period_type.as_str())
        .bind(totals.total_energy_kwh)
        .bind(totals.avg_power_w)
        .bind(totals.total_cost)
        .bind(totals.reading_count)
        .bind(totals.active_time_percentage)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn find_billable_monthly(&self, period_end: DateTime<Utc>) -> Result<Vec<EnergySummary>> {
        let summaries = sqlx::query_as::<_, EnergySummary>(
            r#"
            SELECT * FROM energy_summaries
            WHERE period_type = 'monthly'
              AND period_end = $1
              AND total_cost > 0
            ORDER BY home_id, user_id, id
            "#,
        )
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<EnergySummary>> {
        let summaries = sqlx::query_as::<_, EnergySummary>(
            r#"
            SELECT * FROM energy_summaries
            WHERE home_id = $1
              AND ($2::TEXT IS NULL OR period_type = $2)
              AND ($3::BIGINT IS NULL OR appliance_id = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR period_start >= $4)
              AND ($5::TIMESTAMPTZ IS NULL OR period_start <= $5)
            ORDER BY period_start, period_type, appliance_id
            "#,
        )
        .bind(filter.home_id)
        .bind(filter.period_type.map(|p| p.as_str()))
        .bind(filter.appliance_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }
}
