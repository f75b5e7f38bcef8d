use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use crate::{
    api::middleware::AuthenticatedUser,
    api::models::{SummariesListResponse, SummariesQuery},
    error::{AppError, Result},
    repositories::summaries::SummaryFilter,
    services::homes::owned_home,
};

use super::AppState;

/// GET /api/v1/homes/{home_id}/summaries
/// Filters: period_type, appliance_id, from/to on period_start
pub async fn list_summaries(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(home_id): Path<i64>,
    Query(params): Query<SummariesQuery>,
) -> Result<Json<SummariesListResponse>> {
    owned_home(state.stores.homes.as_ref(), &user.username, home_id).await?;

    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::Validation("from must not be after to".to_string()));
        }
    }

    let summaries = state
        .stores
        .summaries
        .list(&SummaryFilter {
            home_id,
            period_type: params.period_type,
            appliance_id: params.appliance_id,
            from: params.from,
            to: params.to,
        })
        .await?;

    Ok(Json(SummariesListResponse { summaries }))
}
