use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;

use crate::{
    api::middleware::AuthenticatedUser,
    api::models::{BillingRunQuery, BillingRunResponse},
    error::Result,
};

use super::AppState;

/// POST /api/v1/admin/billing/run
/// Runs the bill reminder check now, or as of `?date=`
pub async fn run_billing_check(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<BillingRunQuery>,
) -> Result<Json<BillingRunResponse>> {
    user.require_admin(&state.auth.admin_users)?;

    let run_at = params.date.unwrap_or_else(Utc::now);
    tracing::info!(user_id = %user.username, %run_at, "manual bill reminder check");

    let report = state.billing.run_daily_check(run_at).await?;
    Ok(Json(BillingRunResponse { run_at, report }))
}
