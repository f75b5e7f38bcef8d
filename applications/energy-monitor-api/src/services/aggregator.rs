//! Keeps daily, weekly and monthly summaries in step with saved readings.

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Result;
use crate::periods::PeriodType;
use crate::repositories::readings::{EnergyReading, ReadingScope};
use crate::repositories::summaries::{EnergySummary, SummaryTotals, SummaryUpsert};
use crate::repositories::{ReadingStore, SummaryStore};

type BucketKey = (ReadingScope, PeriodType, DateTime<Utc>);

/// One async lock per summary bucket, created on demand.
#[derive(Default)]
struct BucketLocks {
    locks: Mutex<HashMap<BucketKey, Arc<Mutex<()>>>>,
}

impl BucketLocks {
    async fn acquire(&self, key: BucketKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the map holds these, nobody is waiting on them.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Reduce the readings of one bucket to summary totals.
pub fn compute_totals(readings: &[EnergyReading], rate_per_kwh: f64) -> SummaryTotals {
    if readings.is_empty() {
        return SummaryTotals::default();
    }

    let count = readings.len() as f64;
    let total_energy_kwh: f64 = readings.iter().map(|r| r.energy_kwh).sum();
    let total_power_w: f64 = readings.iter().map(|r| r.power_w).sum();
    let active = readings.iter().filter(|r| r.is_on).count() as f64;

    SummaryTotals {
        total_energy_kwh,
        avg_power_w: total_power_w / count,
        total_cost: total_energy_kwh * rate_per_kwh,
        reading_count: readings.len() as i64,
        active_time_percentage: 100.0 * active / count,
    }
}

pub struct Aggregator {
    readings: Arc<dyn ReadingStore>,
    summaries: Arc<dyn SummaryStore>,
    rate_per_kwh: f64,
    offset: FixedOffset,
    locks: BucketLocks,
}

impl Aggregator {
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        summaries: Arc<dyn SummaryStore>,
        rate_per_kwh: f64,
        offset: FixedOffset,
    ) -> Self {
        Self {
            readings,
            summaries,
            rate_per_kwh,
            offset,
            locks: BucketLocks::default(),
        }
    }

    pub fn rate_per_kwh(&self) -> f64 {
        self.rate_per_kwh
    }

    /// Recompute the three buckets containing `reading` from the stored readings.
    ///
    /// Returns the upserted summaries in daily, weekly, monthly order. The
    /// first storage error aborts the pass and is returned to the caller.
    pub async fn on_reading_saved(&self, reading: &EnergyReading) -> Result<Vec<EnergySummary>> {
        let scope = reading.scope();
        let mut updated = Vec::with_capacity(PeriodType::ALL.len());

        for period_type in PeriodType::ALL {
            let summary = self
                .recompute_bucket(&scope, period_type, reading.recorded_at)
                .await?;
            updated.push(summary);
        }

        Ok(updated)
    }

    /// Recompute every bucket `readings` fall into, each bucket once.
    ///
    /// Used after readings moved to another scope. Returns how many buckets
    /// were rewritten.
    pub async fn rebuild(&self, readings: &[EnergyReading]) -> Result<usize> {
        let mut seen: HashSet<BucketKey> = HashSet::new();

        for reading in readings {
            let scope = reading.scope();
            for period_type in PeriodType::ALL {
                let (period_start, _) = period_type.bounds(reading.recorded_at, self.offset);
                if !seen.insert((scope.clone(), period_type, period_start)) {
                    continue;
                }
                self.recompute_bucket(&scope, period_type, reading.recorded_at)
                    .await?;
            }
        }

        Ok(seen.len())
    }

    async fn recompute_bucket(
        &self,
        scope: &ReadingScope,
        period_type: PeriodType,
        at: DateTime<Utc>,
    ) -> Result<EnergySummary> {
        let (period_start, period_end) = period_type.bounds(at, self.offset);
        let _guard = self
            .locks
            .acquire((scope.clone(), period_type, period_start))
            .await;

        let readings = self
            .readings
            .find_in_window(scope, period_start, period_end)
            .await?;
        let totals = compute_totals(&readings, self.rate_per_kwh);

        let summary = self
            .summaries
            .upsert(&SummaryUpsert {
                scope: scope.clone(),
                period_type,
                period_start,
                period_end,
                totals,
            })
            .await?;

        tracing::debug!(
            home_id = scope.home_id,
            appliance_id = ?scope.appliance_id,
            period_type = %period_type,
            reading_count = totals.reading_count,
            total_energy_kwh = totals.total_energy_kwh,
            "summary updated"
        );

        Ok(summary)
    }
}
