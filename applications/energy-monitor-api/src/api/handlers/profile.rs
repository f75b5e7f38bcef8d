use axum::{extract::State, Extension, Json};

use crate::{
    api::middleware::AuthenticatedUser,
    error::Result,
    repositories::profiles::{Profile, ProfileUpdate},
};

use super::AppState;

/// GET /api/v1/profile
/// Users without a stored profile get the default preferences
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Profile>> {
    let profile = state
        .stores
        .profiles
        .get(&user.username)
        .await?
        .unwrap_or_else(|| Profile::defaults_for(&user.username));
    Ok(Json(profile))
}

/// PUT /api/v1/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    let profile = state.stores.profiles.upsert(&user.username, &update).await?;
    tracing::info!(user_id = %user.username, "profile updated");
    Ok(Json(profile))
}
