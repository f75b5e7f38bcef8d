use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    api::middleware::AuthenticatedUser,
    api::models::{NotificationsListResponse, NotificationsQuery},
    error::{AppError, Result},
    repositories::notifications::{Notification, NotificationStatus},
};

use super::AppState;

async fn owned_notification(state: &AppState, user_id: &str, id: i64) -> Result<Notification> {
    let notification = state
        .stores
        .notifications
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

    if notification.user_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Notification {} belongs to another user",
            id
        )));
    }
    Ok(notification)
}

/// GET /api/v1/notifications
/// Newest first, optionally filtered by status
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<NotificationsQuery>,
) -> Result<Json<NotificationsListResponse>> {
    let notifications = state
        .stores
        .notifications
        .list_for_user(&user.username, params.status)
        .await?;
    Ok(Json(NotificationsListResponse { notifications }))
}

/// POST /api/v1/notifications/{id}/acknowledge
pub async fn acknowledge_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<Notification>> {
    owned_notification(&state, &user.username, id).await?;

    let notification = state
        .stores
        .notifications
        .set_status(id, NotificationStatus::Acknowledged, None)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
    Ok(Json(notification))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    owned_notification(&state, &user.username, id).await?;
    state.stores.notifications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
