pub mod admin;
pub mod energy;
pub mod homes;
pub mod notifications;

pub use admin::*;
pub use energy::*;
pub use homes::*;
pub use notifications::*;
