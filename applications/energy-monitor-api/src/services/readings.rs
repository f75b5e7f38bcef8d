use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::repositories::readings::{EnergyReading, NewReading, ReadingFilter};
use crate::repositories::{HomeStore, ReadingStore};
use crate::services::aggregator::Aggregator;
use crate::services::homes::{appliance_in_home, owned_home, room_in_home};

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Measurement values shared by every ingestion path.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Measurement {
    pub energy_kwh: f64,
    pub power_w: f64,
    pub current_a: f64,
    pub voltage_v: f64,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
    /// Defaults to `power_w > 0`.
    #[serde(default)]
    pub is_on: Option<bool>,
    #[serde(default)]
    pub is_randomized: Option<bool>,
}

impl Measurement {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("energy_kwh", self.energy_kwh),
            ("power_w", self.power_w),
            ("current_a", self.current_a),
            ("voltage_v", self.voltage_v),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "{} must be a finite, non-negative number",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Reading submitted by an authenticated user.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NewReadingRequest {
    pub home_id: i64,
    pub appliance_id: i64,
    #[serde(default)]
    pub room_id: Option<i64>,
    #[serde(flatten)]
    pub measurement: Measurement,
}

/// Where a validated reading goes.
#[derive(Debug, Clone)]
struct Target {
    home_id: i64,
    user_id: String,
    appliance_id: i64,
    room_id: Option<i64>,
}

#[derive(Clone)]
pub struct ReadingService {
    homes: Arc<dyn HomeStore>,
    readings: Arc<dyn ReadingStore>,
    aggregator: Arc<Aggregator>,
    max_batch_size: usize,
}

impl ReadingService {
    pub fn new(
        homes: Arc<dyn HomeStore>,
        readings: Arc<dyn ReadingStore>,
        aggregator: Arc<Aggregator>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            homes,
            readings,
            aggregator,
            max_batch_size,
        }
    }

    /// Validate, persist and aggregate one reading for `user_id`.
    pub async fn submit(&self, user_id: &str, request: NewReadingRequest) -> Result<EnergyReading> {
        let target = self.resolve(user_id, &request).await?;
        self.store(target, &request.measurement).await
    }

    /// Every item is validated before any of them is stored.
    pub async fn submit_batch(
        &self,
        user_id: &str,
        requests: Vec<NewReadingRequest>,
    ) -> Result<Vec<EnergyReading>> {
        if requests.is_empty() {
            return Err(AppError::Validation("Batch must not be empty".to_string()));
        }
        if requests.len() > self.max_batch_size {
            return Err(AppError::Validation(format!(
                "Batch of {} readings exceeds the limit of {}",
                requests.len(),
                self.max_batch_size
            )));
        }

        let mut targets = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let target = self.resolve(user_id, request).await.map_err(|e| match e {
                AppError::Validation(msg) => AppError::Validation(format!("item {}: {}", index, msg)),
                other => other,
            })?;
            targets.push(target);
        }

        let mut saved = Vec::with_capacity(requests.len());
        for (target, request) in targets.into_iter().zip(&requests) {
            saved.push(self.store(target, &request.measurement).await?);
        }

        tracing::info!(user_id, count = saved.len(), "reading batch stored");
        Ok(saved)
    }

    /// Reading posted by a metering device identified by its key.
    ///
    /// Home, user, appliance and room all follow from the appliance the key
    /// belongs to.
    pub async fn submit_from_device(
        &self,
        device_key: &str,
        measurement: Measurement,
    ) -> Result<EnergyReading> {
        let appliance = self
            .homes
            .find_appliance_by_device_key(device_key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown device key".to_string()))?;
        let home = self
            .homes
            .get_home(appliance.home_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Home {} not found", appliance.home_id)))?;

        measurement.validate()?;

        let target = Target {
            home_id: home.id,
            user_id: home.user_id,
            appliance_id: appliance.id,
            room_id: appliance.room_id,
        };
        self.store(target, &measurement).await
    }

    pub async fn list(&self, user_id: &str, filter: ReadingFilter) -> Result<Vec<EnergyReading>> {
        owned_home(self.homes.as_ref(), user_id, filter.home_id).await?;

        if filter.limit < 1 || filter.limit > MAX_LIST_LIMIT {
            return Err(AppError::Validation(format!(
                "Limit must be between 1 and {}",
                MAX_LIST_LIMIT
            )));
        }
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AppError::Validation(
                    "from must not be after to".to_string(),
                ));
            }
        }

        self.readings.list(&filter).await
    }

    async fn resolve(&self, user_id: &str, request: &NewReadingRequest) -> Result<Target> {
        request.measurement.validate()?;

        let home = owned_home(self.homes.as_ref(), user_id, request.home_id).await?;
        let appliance = appliance_in_home(self.homes.as_ref(), home.id, request.appliance_id).await?;
        let room_id = match request.room_id {
            Some(room_id) => Some(room_in_home(self.homes.as_ref(), home.id, room_id).await?.id),
            None => appliance.room_id,
        };

        Ok(Target {
            home_id: home.id,
            user_id: home.user_id,
            appliance_id: appliance.id,
            room_id,
        })
    }

    async fn store(&self, target: Target, measurement: &Measurement) -> Result<EnergyReading> {
        let new_reading = NewReading {
            home_id: target.home_id,
            user_id: target.user_id,
            appliance_id: target.appliance_id,
            room_id: target.room_id,
            energy_kwh: measurement.energy_kwh,
            power_w: measurement.power_w,
            current_a: measurement.current_a,
            voltage_v: measurement.voltage_v,
            cost: measurement.energy_kwh * self.aggregator.rate_per_kwh(),
            recorded_at: measurement.recorded_at.unwrap_or_else(Utc::now),
            is_on: measurement.is_on.unwrap_or(measurement.power_w > 0.0),
            is_randomized: measurement.is_randomized.unwrap_or(false),
        };

        let reading = self.readings.insert(&new_reading).await?;

        // The reading is already stored; a failure here still fails the request.
        if let Err(e) = self.aggregator.on_reading_saved(&reading).await {
            tracing::error!(
                reading_id = reading.id,
                home_id = reading.home_id,
                error = %e,
                "summary aggregation failed"
            );
            return Err(e);
        }

        tracing::debug!(
            reading_id = reading.id,
            home_id = reading.home_id,
            appliance_id = reading.appliance_id,
            "reading stored"
        );
        Ok(reading)
    }
}
