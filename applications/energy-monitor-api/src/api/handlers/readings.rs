use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};

use crate::{
    api::middleware::{AuthenticatedUser, DEVICE_KEY_HEADER},
    api::models::{BatchReadingsResponse, ReadingsListResponse, ReadingsQuery},
    error::{AppError, Result},
    repositories::readings::{EnergyReading, ReadingFilter},
    services::readings::{Measurement, NewReadingRequest, DEFAULT_LIST_LIMIT},
};

use super::AppState;

/// POST /api/v1/readings
pub async fn create_reading(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<NewReadingRequest>,
) -> Result<(StatusCode, Json<EnergyReading>)> {
    let reading = state.readings.submit(&user.username, request).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// POST /api/v1/readings/batch
pub async fn create_readings_batch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(requests): Json<Vec<NewReadingRequest>>,
) -> Result<(StatusCode, Json<BatchReadingsResponse>)> {
    let readings = state.readings.submit_batch(&user.username, requests).await?;
    Ok((
        StatusCode::CREATED,
        Json(BatchReadingsResponse {
            count: readings.len(),
            readings,
        }),
    ))
}

/// POST /api/v1/devices/readings
/// Authenticated by the appliance's device key instead of a user session
pub async fn create_device_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(measurement): Json<Measurement>,
) -> Result<(StatusCode, Json<EnergyReading>)> {
    let device_key = headers
        .get(DEVICE_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing device key".to_string()))?;

    let reading = state
        .readings
        .submit_from_device(device_key, measurement)
        .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// GET /api/v1/homes/{home_id}/readings
pub async fn list_readings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<ReadingsListResponse>> {
    let filter = ReadingFilter {
        home_id,
        appliance_id: params.appliance_id,
        from: params.from,
        to: params.to,
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    };

    let readings = state.readings.list(&user.username, filter).await?;
    Ok(Json(ReadingsListResponse { readings }))
}
