pub mod aggregator;
pub mod billing;
pub mod emitter;
pub mod homes;
pub mod readings;

pub use aggregator::Aggregator;
pub use billing::{BillingReminderJob, BillingRunReport};
pub use emitter::{NotificationEmitter, StatusEmitter};
pub use homes::HomeService;
pub use readings::ReadingService;
