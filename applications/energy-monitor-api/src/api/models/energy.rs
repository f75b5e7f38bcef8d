use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::periods::PeriodType;
pub use crate::repositories::readings::EnergyReading;
pub use crate::repositories::summaries::EnergySummary;

#[derive(Debug, Deserialize, Default)]
pub struct ReadingsQuery {
    pub appliance_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReadingsListResponse {
    pub readings: Vec<EnergyReading>,
}

#[derive(Debug, Serialize)]
pub struct BatchReadingsResponse {
    pub count: usize,
    pub readings: Vec<EnergyReading>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SummariesQuery {
    pub period_type: Option<PeriodType>,
    pub appliance_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SummariesListResponse {
    pub summaries: Vec<EnergySummary>,
}
