pub mod homes;
pub mod notifications;
pub mod profiles;
pub mod readings;
pub mod summaries;

use std::sync::Arc;

use crate::db::DbPool;

pub use homes::{HomeStore, HomesRepository};
pub use notifications::{NotificationStore, NotificationsRepository};
pub use profiles::{ProfileStore, ProfilesRepository};
pub use readings::{ReadingStore, ReadingsRepository};
pub use summaries::{SummariesRepository, SummaryStore};

/// Storage handles shared by services and handlers.
#[derive(Clone)]
pub struct Stores {
    pub homes: Arc<dyn HomeStore>,
    pub readings: Arc<dyn ReadingStore>,
    pub summaries: Arc<dyn SummaryStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            homes: Arc::new(HomesRepository::new(pool.clone())),
            readings: Arc::new(ReadingsRepository::new(pool.clone())),
            summaries: Arc::new(SummariesRepository::new(pool.clone())),
            notifications: Arc::new(NotificationsRepository::new(pool.clone())),
            profiles: Arc::new(ProfilesRepository::new(pool)),
        }
    }
}
