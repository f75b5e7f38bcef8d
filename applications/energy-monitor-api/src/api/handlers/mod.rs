pub mod admin;
pub mod health;
pub mod homes;
pub mod notifications;
pub mod profile;
pub mod readings;
pub mod summaries;

use std::sync::Arc;

use crate::{
    config::{AuthConfig, Config},
    db::DbPool,
    repositories::Stores,
    services::{Aggregator, BillingReminderJob, HomeService, ReadingService, StatusEmitter},
};

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub homes: Arc<HomeService>,
    pub readings: Arc<ReadingService>,
    pub billing: Arc<BillingReminderJob>,
    pub auth: AuthConfig,
    /// Absent when running against non-Postgres stores.
    pub pool: Option<DbPool>,
}

impl AppState {
    pub fn new(stores: Stores, config: &Config, pool: Option<DbPool>) -> anyhow::Result<Self> {
        let offset = config.billing.local_offset()?;

        let aggregator = Arc::new(Aggregator::new(
            stores.readings.clone(),
            stores.summaries.clone(),
            config.billing.rate_per_kwh,
            offset,
        ));
        let homes = HomeService::new(
            stores.homes.clone(),
            stores.readings.clone(),
            stores.profiles.clone(),
            aggregator.clone(),
        );
        let readings = ReadingService::new(
            stores.homes.clone(),
            stores.readings.clone(),
            aggregator,
            config.ingest.max_batch_size,
        );
        let billing = BillingReminderJob::new(
            stores.summaries.clone(),
            stores.profiles.clone(),
            stores.homes.clone(),
            stores.notifications.clone(),
            Arc::new(StatusEmitter::new(stores.notifications.clone())),
            config.billing.due_days,
            offset,
        );

        Ok(Self {
            homes: Arc::new(homes),
            readings: Arc::new(readings),
            billing: Arc::new(billing),
            auth: config.auth.clone(),
            stores,
            pool,
        })
    }
}
