use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::repositories::homes::{
    Appliance, ApplianceCreate, Home, HomeCreate, Room, RoomCreate,
};
use crate::repositories::profiles::ProfileUpdate;
use crate::repositories::readings::EnergyReading;
use crate::repositories::{HomeStore, ProfileStore, ReadingStore};
use crate::services::Aggregator;

/// Load a home and check that `user_id` owns it.
pub async fn owned_home(homes: &dyn HomeStore, user_id: &str, home_id: i64) -> Result<Home> {
    let home = homes
        .get_home(home_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Home {} not found", home_id)))?;

    if home.user_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Home {} belongs to another user",
            home_id
        )));
    }

    Ok(home)
}

/// Load an appliance and check that it sits in `home_id`.
pub async fn appliance_in_home(
    homes: &dyn HomeStore,
    home_id: i64,
    appliance_id: i64,
) -> Result<Appliance> {
    homes
        .get_appliance(appliance_id)
        .await?
        .filter(|a| a.home_id == home_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Appliance {} not found in home {}",
                appliance_id, home_id
            ))
        })
}

/// Load a room and check that it sits in `home_id`.
pub async fn room_in_home(homes: &dyn HomeStore, home_id: i64, room_id: i64) -> Result<Room> {
    homes
        .get_room(room_id)
        .await?
        .filter(|r| r.home_id == home_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Room {} not found in home {}", room_id, home_id))
        })
}

fn require_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(format!("{} name must not be empty", what)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HomeService {
    homes: Arc<dyn HomeStore>,
    readings: Arc<dyn ReadingStore>,
    profiles: Arc<dyn ProfileStore>,
    aggregator: Arc<Aggregator>,
}

impl HomeService {
    pub fn new(
        homes: Arc<dyn HomeStore>,
        readings: Arc<dyn ReadingStore>,
        profiles: Arc<dyn ProfileStore>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            homes,
            readings,
            profiles,
            aggregator,
        }
    }

    /// Creates the home, and the owner's default profile if they have none yet.
    pub async fn create_home(&self, user_id: &str, create: &HomeCreate) -> Result<Home> {
        require_name(&create.name, "Home")?;
        let home = self.homes.create_home(user_id, create).await?;
        tracing::info!(home_id = home.id, user_id, "home created");

        if self.profiles.get(user_id).await?.is_none() {
            self.profiles.upsert(user_id, &ProfileUpdate::default()).await?;
            tracing::info!(user_id, "default profile created");
        }

        Ok(home)
    }

    pub async fn list_homes(&self, user_id: &str) -> Result<Vec<Home>> {
        self.homes.list_homes(user_id).await
    }

    pub async fn get_home(&self, user_id: &str, home_id: i64) -> Result<Home> {
        owned_home(self.homes.as_ref(), user_id, home_id).await
    }

    /// Removes the home with its rooms, appliances, readings and summaries.
    pub async fn delete_home(&self, user_id: &str, home_id: i64) -> Result<()> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        if !self.homes.delete_home(home_id).await? {
            return Err(AppError::NotFound(format!("Home {} not found", home_id)));
        }
        tracing::info!(home_id, user_id, "home deleted");
        Ok(())
    }

    pub async fn create_room(&self, user_id: &str, home_id: i64, create: &RoomCreate) -> Result<Room> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        require_name(&create.name, "Room")?;
        self.homes.create_room(home_id, create).await
    }

    pub async fn list_rooms(&self, user_id: &str, home_id: i64) -> Result<Vec<Room>> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        self.homes.list_rooms(home_id).await
    }

    /// Removes the room. Its readings stay and lose their room, so the
    /// summaries they fed are rebuilt under the room-less scope.
    pub async fn delete_room(&self, user_id: &str, home_id: i64, room_id: i64) -> Result<()> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        room_in_home(self.homes.as_ref(), home_id, room_id).await?;

        let moved = self.readings.find_by_room(room_id).await?;
        self.homes.delete_room(room_id).await?;

        let moved: Vec<_> = moved
            .into_iter()
            .map(|reading| EnergyReading {
                room_id: None,
                ..reading
            })
            .collect();
        let rebuilt = self.aggregator.rebuild(&moved).await.map_err(|e| {
            tracing::error!(room_id, home_id, error = %e, "failed to rebuild summaries after room delete");
            e
        })?;

        tracing::info!(room_id, home_id, readings = moved.len(), rebuilt, "room deleted");
        Ok(())
    }

    pub async fn create_appliance(
        &self,
        user_id: &str,
        home_id: i64,
        create: &ApplianceCreate,
    ) -> Result<Appliance> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        require_name(&create.name, "Appliance")?;

        if let Some(rated) = create.rated_power_w {
            if !rated.is_finite() || rated < 0.0 {
                return Err(AppError::Validation(
                    "rated_power_w must be a finite, non-negative number".to_string(),
                ));
            }
        }
        if let Some(room_id) = create.room_id {
            room_in_home(self.homes.as_ref(), home_id, room_id).await?;
        }
        if create.device_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(AppError::Validation("device_key must not be empty".to_string()));
        }

        self.homes.create_appliance(home_id, create).await
    }

    pub async fn list_appliances(&self, user_id: &str, home_id: i64) -> Result<Vec<Appliance>> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        self.homes.list_appliances(home_id).await
    }

    pub async fn delete_appliance(
        &self,
        user_id: &str,
        home_id: i64,
        appliance_id: i64,
    ) -> Result<()> {
        owned_home(self.homes.as_ref(), user_id, home_id).await?;
        appliance_in_home(self.homes.as_ref(), home_id, appliance_id).await?;
        self.homes.delete_appliance(appliance_id).await?;
        Ok(())
    }
}
