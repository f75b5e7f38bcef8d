use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    api::middleware::AuthenticatedUser,
    api::models::{AppliancesListResponse, HomesListResponse, RoomsListResponse},
    error::Result,
    repositories::homes::{Appliance, ApplianceCreate, Home, HomeCreate, Room, RoomCreate},
};

use super::AppState;

// ============================================================================
// Homes
// ============================================================================

/// POST /api/v1/homes
pub async fn create_home(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(create): Json<HomeCreate>,
) -> Result<(StatusCode, Json<Home>)> {
    let home = state.homes.create_home(&user.username, &create).await?;
    Ok((StatusCode::CREATED, Json(home)))
}

/// GET /api/v1/homes
pub async fn list_homes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<HomesListResponse>> {
    let homes = state.homes.list_homes(&user.username).await?;
    Ok(Json(HomesListResponse { homes }))
}

/// GET /api/v1/homes/{home_id}
pub async fn get_home(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
) -> Result<Json<Home>> {
    let home = state.homes.get_home(&user.username, home_id).await?;
    Ok(Json(home))
}

/// DELETE /api/v1/homes/{home_id}
pub async fn delete_home(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
) -> Result<StatusCode> {
    state.homes.delete_home(&user.username, home_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Rooms
// ============================================================================

/// POST /api/v1/homes/{home_id}/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
    Json(create): Json<RoomCreate>,
) -> Result<(StatusCode, Json<Room>)> {
    let room = state
        .homes
        .create_room(&user.username, home_id, &create)
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/v1/homes/{home_id}/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
) -> Result<Json<RoomsListResponse>> {
    let rooms = state.homes.list_rooms(&user.username, home_id).await?;
    Ok(Json(RoomsListResponse { rooms }))
}

/// DELETE /api/v1/homes/{home_id}/rooms/{room_id}
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((home_id, room_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    state
        .homes
        .delete_room(&user.username, home_id, room_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Appliances
// ============================================================================

/// POST /api/v1/homes/{home_id}/appliances
pub async fn create_appliance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
    Json(create): Json<ApplianceCreate>,
) -> Result<(StatusCode, Json<Appliance>)> {
    let appliance = state
        .homes
        .create_appliance(&user.username, home_id, &create)
        .await?;
    Ok((StatusCode::CREATED, Json(appliance)))
}

/// GET /api/v1/homes/{home_id}/appliances
pub async fn list_appliances(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
) -> Result<Json<AppliancesListResponse>> {
    let appliances = state.homes.list_appliances(&user.username, home_id).await?;
    Ok(Json(AppliancesListResponse { appliances }))
}

/// DELETE /api/v1/homes/{home_id}/appliances/{appliance_id}
pub async fn delete_appliance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((home_id, appliance_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    state
        .homes
        .delete_appliance(&user.username, home_id, appliance_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
