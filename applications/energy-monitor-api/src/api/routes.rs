use axum::{
    extract::Request,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Level;

use super::handlers::{
    admin, health, homes, notifications, profile, readings, summaries, AppState,
};
use super::middleware::require_user;

pub fn create_router(state: AppState) -> Router {
    // User routes (oauth2-proxy header or bearer token)
    let user_routes = Router::new()
        .route("/api/v1/homes", get(homes::list_homes).post(homes::create_home))
        .route(
            "/api/v1/homes/{home_id}",
            get(homes::get_home).delete(homes::delete_home),
        )
        .route(
            "/api/v1/homes/{home_id}/rooms",
            get(homes::list_rooms).post(homes::create_room),
        )
        .route(
            "/api/v1/homes/{home_id}/rooms/{room_id}",
            delete(homes::delete_room),
        )
        .route(
            "/api/v1/homes/{home_id}/appliances",
            get(homes::list_appliances).post(homes::create_appliance),
        )
        .route(
            "/api/v1/homes/{home_id}/appliances/{appliance_id}",
            delete(homes::delete_appliance),
        )
        .route(
            "/api/v1/homes/{home_id}/readings",
            get(readings::list_readings),
        )
        .route(
            "/api/v1/homes/{home_id}/summaries",
            get(summaries::list_summaries),
        )
        .route("/api/v1/readings", post(readings::create_reading))
        .route(
            "/api/v1/readings/batch",
            post(readings::create_readings_batch),
        )
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/{id}",
            delete(notifications::delete_notification),
        )
        .route(
            "/api/v1/notifications/{id}/acknowledge",
            post(notifications::acknowledge_notification),
        )
        .route(
            "/api/v1/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route(
            "/api/v1/admin/billing/run",
            post(admin::run_billing_check),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    // Public routes (health check, device ingestion with its own key)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/devices/readings",
            post(readings::create_device_reading),
        );

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                })
                .on_response(
                    |_response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::INFO, latency = ?latency, "request completed");
                    },
                )
                .on_failure(
                    |_error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::ERROR, "request failed");
                    },
                ),
        )
}
