//! Content pool handlers

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use super::pool_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::TierChangeRequest;
use crate::infra::http::api::state::AdminState;

pub async fn pool_overview(State(state): State<AdminState>) -> Result<impl IntoResponse, ApiError> {
    let overview = state.pool.overview().await.map_err(pool_to_api)?;
    Ok(Json(overview))
}

pub async fn set_platform_tier(
    State(state): State<AdminState>,
    Json(payload): Json<TierChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let change = state
        .pool
        .set_platform_tier(payload.platform, payload.tier)
        .await
        .map_err(pool_to_api)?;
    Ok(Json(change))
}
