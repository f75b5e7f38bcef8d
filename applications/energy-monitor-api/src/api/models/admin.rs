use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::BillingRunReport;

#[derive(Debug, Deserialize, Default)]
pub struct BillingRunQuery {
    /// Run as if it were this instant instead of now.
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BillingRunResponse {
    pub run_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: BillingRunReport,
}
