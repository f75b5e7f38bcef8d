#![allow(dead_code)]

// Shared fixtures for the integration tests.
// InMemoryStore implements every store trait so services and the HTTP API
// can run without Postgres.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use energy_monitor_api::api::AppState;
use energy_monitor_api::config::Config;
use energy_monitor_api::error::{AppError, Result};
use energy_monitor_api::repositories::homes::{
    Appliance, ApplianceCreate, Home, HomeCreate, Room, RoomCreate,
};
use energy_monitor_api::repositories::notifications::{
    NewNotification, Notification, NotificationStatus,
};
use energy_monitor_api::repositories::profiles::{Profile, ProfileUpdate};
use energy_monitor_api::repositories::readings::{
    EnergyReading, NewReading, ReadingFilter, ReadingScope,
};
use energy_monitor_api::repositories::summaries::{EnergySummary, SummaryFilter, SummaryUpsert};
use energy_monitor_api::repositories::{
    HomeStore, NotificationStore, ProfileStore, ReadingStore, Stores, SummaryStore,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    homes: BTreeMap<i64, Home>,
    rooms: BTreeMap<i64, Room>,
    appliances: BTreeMap<i64, Appliance>,
    readings: BTreeMap<i64, EnergyReading>,
    summaries: BTreeMap<i64, EnergySummary>,
    notifications: BTreeMap<i64, Notification>,
    profiles: BTreeMap<String, Profile>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_summary_upserts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            homes: self.clone(),
            readings: self.clone(),
            summaries: self.clone(),
            notifications: self.clone(),
            profiles: self.clone(),
        }
    }

    /// Make every summary upsert fail with a database error.
    pub fn fail_summary_upserts(&self, fail: bool) {
        self.fail_summary_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn reading_count(&self) -> usize {
        self.tables.lock().unwrap().readings.len()
    }

    pub fn all_summaries(&self) -> Vec<EnergySummary> {
        self.tables.lock().unwrap().summaries.values().cloned().collect()
    }

    pub fn all_notifications(&self) -> Vec<Notification> {
        self.tables
            .lock()
            .unwrap()
            .notifications
            .values()
            .cloned()
            .collect()
    }

    /// Store a summary directly, as if the aggregator had written it.
    pub fn put_summary(&self, summary: EnergySummary) -> EnergySummary {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let summary = EnergySummary { id, ..summary };
        tables.summaries.insert(id, summary.clone());
        summary
    }
}

fn same_scope(reading: &EnergyReading, scope: &ReadingScope) -> bool {
    reading.home_id == scope.home_id
        && reading.user_id == scope.user_id
        && Some(reading.appliance_id) == scope.appliance_id
        && reading.room_id == scope.room_id
}

#[async_trait]
impl HomeStore for InMemoryStore {
    async fn create_home(&self, user_id: &str, create: &HomeCreate) -> Result<Home> {
        let mut tables = self.tables.lock().unwrap();
        let home = Home {
            id: tables.next_id(),
            user_id: user_id.to_string(),
            name: create.name.clone(),
            address: create.address.clone(),
            created_at: Utc::now(),
        };
        tables.homes.insert(home.id, home.clone());
        Ok(home)
    }

    async fn list_homes(&self, user_id: &str) -> Result<Vec<Home>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .homes
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_home(&self, id: i64) -> Result<Option<Home>> {
        Ok(self.tables.lock().unwrap().homes.get(&id).cloned())
    }

    async fn delete_home(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        let existed = tables.homes.remove(&id).is_some();
        tables.rooms.retain(|_, r| r.home_id != id);
        tables.appliances.retain(|_, a| a.home_id != id);
        tables.readings.retain(|_, r| r.home_id != id);
        tables.summaries.retain(|_, s| s.home_id != id);
        tables.notifications.retain(|_, n| n.home_id != Some(id));
        Ok(existed)
    }

    async fn create_room(&self, home_id: i64, create: &RoomCreate) -> Result<Room> {
        let mut tables = self.tables.lock().unwrap();
        let room = Room {
            id: tables.next_id(),
            home_id,
            name: create.name.clone(),
            created_at: Utc::now(),
        };
        tables.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn list_rooms(&self, home_id: i64) -> Result<Vec<Room>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .rooms
            .values()
            .filter(|r| r.home_id == home_id)
            .cloned()
            .collect())
    }

    async fn get_room(&self, id: i64) -> Result<Option<Room>> {
        Ok(self.tables.lock().unwrap().rooms.get(&id).cloned())
    }

    async fn delete_room(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        for appliance in tables.appliances.values_mut() {
            if appliance.room_id == Some(id) {
                appliance.room_id = None;
            }
        }
        for reading in tables.readings.values_mut() {
            if reading.room_id == Some(id) {
                reading.room_id = None;
            }
        }
        tables.summaries.retain(|_, s| s.room_id != Some(id));
        Ok(tables.rooms.remove(&id).is_some())
    }

    async fn create_appliance(&self, home_id: i64, create: &ApplianceCreate) -> Result<Appliance> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(key) = &create.device_key {
            if tables
                .appliances
                .values()
                .any(|a| a.device_key.as_ref() == Some(key))
            {
                return Err(AppError::Database(sqlx::Error::Protocol(
                    "duplicate device_key".into(),
                )));
            }
        }
        let appliance = Appliance {
            id: tables.next_id(),
            home_id,
            room_id: create.room_id,
            name: create.name.clone(),
            rated_power_w: create.rated_power_w,
            device_key: create.device_key.clone(),
            created_at: Utc::now(),
        };
        tables.appliances.insert(appliance.id, appliance.clone());
        Ok(appliance)
    }

    async fn list_appliances(&self, home_id: i64) -> Result<Vec<Appliance>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .appliances
            .values()
            .filter(|a| a.home_id == home_id)
            .cloned()
            .collect())
    }

    async fn get_appliance(&self, id: i64) -> Result<Option<Appliance>> {
        Ok(self.tables.lock().unwrap().appliances.get(&id).cloned())
    }

    async fn find_appliance_by_device_key(&self, device_key: &str) -> Result<Option<Appliance>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .appliances
            .values()
            .find(|a| a.device_key.as_deref() == Some(device_key))
            .cloned())
    }

    async fn delete_appliance(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        tables.readings.retain(|_, r| r.appliance_id != id);
        tables.summaries.retain(|_, s| s.appliance_id != Some(id));
        Ok(tables.appliances.remove(&id).is_some())
    }
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn insert(&self, reading: &NewReading) -> Result<EnergyReading> {
        let mut tables = self.tables.lock().unwrap();
        let stored = EnergyReading {
            id: tables.next_id(),
            home_id: reading.home_id,
            user_id: reading.user_id.clone(),
            appliance_id: reading.appliance_id,
            room_id: reading.room_id,
            energy_kwh: reading.energy_kwh,
            power_w: reading.power_w,
            current_a: reading.current_a,
            voltage_v: reading.voltage_v,
            cost: reading.cost,
            recorded_at: reading.recorded_at,
            is_on: reading.is_on,
            is_randomized: reading.is_randomized,
            created_at: Utc::now(),
        };
        tables.readings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_in_window(
        &self,
        scope: &ReadingScope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EnergyReading>> {
        let tables = self.tables.lock().unwrap();
        let mut readings: Vec<EnergyReading> = tables
            .readings
            .values()
            .filter(|r| same_scope(r, scope) && r.recorded_at >= start && r.recorded_at <= end)
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.recorded_at);
        Ok(readings)
    }

    async fn find_by_room(&self, room_id: i64) -> Result<Vec<EnergyReading>> {
        let tables = self.tables.lock().unwrap();
        let mut readings: Vec<EnergyReading> = tables
            .readings
            .values()
            .filter(|r| r.room_id == Some(room_id))
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.recorded_at);
        Ok(readings)
    }

    async fn list(&self, filter: &ReadingFilter) -> Result<Vec<EnergyReading>> {
        let tables = self.tables.lock().unwrap();
        let mut readings: Vec<EnergyReading> = tables
            .readings
            .values()
            .filter(|r| r.home_id == filter.home_id)
            .filter(|r| filter.appliance_id.map_or(true, |id| r.appliance_id == id))
            .filter(|r| filter.from.map_or(true, |from| r.recorded_at >= from))
            .filter(|r| filter.to.map_or(true, |to| r.recorded_at <= to))
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        readings.truncate(filter.limit.max(0) as usize);
        Ok(readings)
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn upsert(&self, summary: &SummaryUpsert) -> Result<EnergySummary> {
        if self.fail_summary_upserts.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut tables = self.tables.lock().unwrap();
        let scope = &summary.scope;
        let existing = tables.summaries.values().find(|s| {
            s.home_id == scope.home_id
                && s.user_id == scope.user_id
                && s.appliance_id == scope.appliance_id
                && s.room_id == scope.room_id
                && s.period_start == summary.period_start
                && s.period_end == summary.period_end
                && s.period_type == summary.period_type
        });
        let id = match existing {
            Some(s) => s.id,
            None => tables.next_id(),
        };

        let stored = EnergySummary {
            id,
            home_id: scope.home_id,
            user_id: scope.user_id.clone(),
            appliance_id: scope.appliance_id,
            room_id: scope.room_id,
            period_start: summary.period_start,
            period_end: summary.period_end,
            period_type: summary.period_type,
            total_energy_kwh: summary.totals.total_energy_kwh,
            avg_power_w: summary.totals.avg_power_w,
            total_cost: summary.totals.total_cost,
            reading_count: summary.totals.reading_count,
            active_time_percentage: summary.totals.active_time_percentage,
            updated_at: Utc::now(),
        };
        tables.summaries.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_billable_monthly(&self, period_end: DateTime<Utc>) -> Result<Vec<EnergySummary>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .summaries
            .values()
            .filter(|s| {
                s.period_type == energy_monitor_api::periods::PeriodType::Monthly
                    && s.period_end == period_end
                    && s.total_cost > 0.0
            })
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<EnergySummary>> {
        let tables = self.tables.lock().unwrap();
        let mut summaries: Vec<EnergySummary> = tables
            .summaries
            .values()
            .filter(|s| s.home_id == filter.home_id)
            .filter(|s| filter.period_type.map_or(true, |p| s.period_type == p))
            .filter(|s| filter.appliance_id.map_or(true, |id| s.appliance_id == Some(id)))
            .filter(|s| filter.from.map_or(true, |from| s.period_start >= from))
            .filter(|s| filter.to.map_or(true, |to| s.period_start <= to))
            .cloned()
            .collect();
        summaries.sort_by_key(|s| (s.period_start, s.period_type.as_str(), s.appliance_id));
        Ok(summaries)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_if_absent(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(key) = &notification.dedupe_key {
            if tables
                .notifications
                .values()
                .any(|n| n.dedupe_key.as_ref() == Some(key))
            {
                return Ok(None);
            }
        }

        let stored = Notification {
            id: tables.next_id(),
            user_id: notification.user_id.clone(),
            home_id: notification.home_id,
            anomaly_alert_id: notification.anomaly_alert_id,
            channels: notification.channels.clone(),
            message: notification.message.clone(),
            status: NotificationStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            due_date: notification.due_date,
            dedupe_key: notification.dedupe_key.clone(),
        };
        tables.notifications.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<Notification>> {
        let tables = self.tables.lock().unwrap();
        let mut notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .filter(|n| status.map_or(true, |s| n.status == s))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(notifications)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.tables.lock().unwrap().notifications.get(&id).cloned())
    }

    async fn set_status(
        &self,
        id: i64,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Notification>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.notifications.get_mut(&id).map(|n| {
            n.status = status;
            if sent_at.is_some() {
                n.sent_at = sent_at;
            }
            n.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.tables.lock().unwrap().notifications.remove(&id).is_some())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.tables.lock().unwrap().profiles.get(user_id).cloned())
    }

    async fn upsert(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile> {
        let mut tables = self.tables.lock().unwrap();
        let profile = tables
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| Profile::defaults_for(user_id));
        if let Some(name) = &update.display_name {
            profile.display_name = Some(name.clone());
        }
        if let Some(email) = update.email_notifications {
            profile.email_notifications = email;
        }
        if let Some(push) = update.push_notifications {
            profile.push_notifications = push;
        }
        if let Some(in_app) = update.in_app_notifications {
            profile.in_app_notifications = in_app;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

/// Config with a 10 per kWh rate, UTC bucketing and `admin` as administrator.
pub fn test_config() -> Config {
    Config::from_yaml(
        r#"
database:
  url: postgres://unused/energy
auth:
  jwt_secret: test-secret-key
  admin_users: [admin]
billing:
  rate_per_kwh: 10.0
  due_days: 15
  timezone_offset_hours: 0
  scheduler_enabled: false
ingest:
  max_batch_size: 3
"#,
    )
    .unwrap()
}

pub fn test_state(store: &Arc<InMemoryStore>) -> AppState {
    AppState::new(store.stores(), &test_config(), None).unwrap()
}

/// A home owned by `user` with one room and one appliance in that room.
pub struct Fixture {
    pub home: Home,
    pub room: Room,
    pub appliance: Appliance,
}

pub async fn seed_home(store: &Arc<InMemoryStore>, user: &str, device_key: Option<&str>) -> Fixture {
    let home = store
        .create_home(
            user,
            &HomeCreate {
                name: "Cabin".into(),
                address: None,
            },
        )
        .await
        .unwrap();
    let room = store
        .create_room(home.id, &RoomCreate { name: "Kitchen".into() })
        .await
        .unwrap();
    let appliance = store
        .create_appliance(
            home.id,
            &ApplianceCreate {
                name: "Fridge".into(),
                room_id: Some(room.id),
                rated_power_w: Some(150.0),
                device_key: device_key.map(str::to_string),
            },
        )
        .await
        .unwrap();

    Fixture {
        home,
        room,
        appliance,
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}
