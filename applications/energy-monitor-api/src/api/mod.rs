pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
