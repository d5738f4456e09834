//! Schedule handlers: forecast, refill, reconcile, slot outcomes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::schedule::SlotOutcome;

use super::{resolve_date, schedule_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::AdminState;

pub async fn get_forecast(
    State(state): State<AdminState>,
    Query(query): Query<ForecastQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = resolve_date(query.date.as_deref(), &state.calendar)?;
    let forecast = state.forecast.forecast(date).await.map_err(schedule_to_api)?;
    Ok(Json(forecast))
}

pub async fn refill(
    State(state): State<AdminState>,
    Json(payload): Json<RefillRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let date = resolve_date(payload.date.as_deref(), &state.calendar)?;

    let response = match payload.days {
        None | Some(2) => RefillResponse::TwoDay(
            state
                .refill
                .refill_two_days(date)
                .await
                .map_err(schedule_to_api)?,
        ),
        Some(days) => RefillResponse::Span(
            state
                .refill
                .refill_days(date, days)
                .await
                .map_err(schedule_to_api)?,
        ),
    };

    Ok(Json(response))
}

pub async fn reconcile(
    State(state): State<AdminState>,
    Json(payload): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let date = resolve_date(payload.date.as_deref(), &state.calendar)?;
    let report = state
        .reconcile
        .reconcile(date, payload.repair)
        .await
        .map_err(schedule_to_api)?;
    Ok(Json(report))
}

pub async fn record_slot_outcome(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SlotOutcomeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = match payload.status {
        OutcomeStatus::Posted => SlotOutcome::Posted {
            posted_at: payload.posted_at.unwrap_or_else(OffsetDateTime::now_utc),
            external_id: payload.external_id,
        },
        OutcomeStatus::Failed => {
            let error = payload
                .error
                .filter(|message| !message.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::bad_request(
                        "Failed outcomes need an error",
                        Some("set `error` to the failure reason".to_string()),
                    )
                })?;
            SlotOutcome::Failed { error }
        }
    };

    let receipt = state
        .outcomes
        .record_outcome(id, outcome)
        .await
        .map_err(schedule_to_api)?;
    Ok(Json(receipt))
}
