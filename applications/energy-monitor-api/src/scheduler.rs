//! Billing scheduler background task
//!
//! Wakes once a day at the configured local hour and runs the bill reminder
//! check. A failed run is logged and the next attempt is the next day.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

use crate::services::BillingReminderJob;

/// First instant strictly after `now` at `hour:00` local time.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, offset: FixedOffset) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let local_day = now.with_timezone(&offset).date_naive();
    let to_utc = |naive: chrono::NaiveDateTime| {
        Utc.from_utc_datetime(&(naive - Duration::seconds(i64::from(offset.local_minus_utc()))))
    };

    let today = to_utc(local_day.and_time(at));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

pub struct BillingScheduler {
    job: Arc<BillingReminderJob>,
    run_at_hour: u32,
    offset: FixedOffset,
}

impl BillingScheduler {
    pub fn new(job: Arc<BillingReminderJob>, run_at_hour: u32, offset: FixedOffset) -> Self {
        Self {
            job,
            run_at_hour,
            offset,
        }
    }

    /// Run the scheduler loop
    pub async fn run(&self) {
        tracing::info!(
            "Billing scheduler started (daily at {:02}:00, offset {})",
            self.run_at_hour,
            self.offset
        );

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.run_at_hour, self.offset);
            tracing::debug!(%next, "next bill reminder check scheduled");

            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

            match self.job.run_daily_check(Utc::now()).await {
                Ok(report) => tracing::debug!(?report, "scheduled bill reminder check done"),
                Err(e) => tracing::error!("Billing scheduler error: {}", e),
            }
        }
    }
}
