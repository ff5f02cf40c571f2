use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::candidate_dto::{
    CreateCandidatePayload, UpdateCandidatePayload, UpdateStatusPayload,
};
use crate::dto::Pagination;
use crate::error::Result;
use crate::services::candidate_service::{parse_year_month, previous_month};
use crate::AppState;

pub async fn list_candidates(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let response = state.candidate_service.list_candidates(pagination).await?;
    Ok(Json(response))
}

pub async fn create_candidate(
    State(state): State<AppState>,
    Json(payload): Json<CreateCandidatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let candidate = state.candidate_service.create_candidate(payload).await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

pub async fn update_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCandidatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let candidate = state.candidate_service.update_candidate(id, payload).await?;
    Ok(Json(candidate))
}

pub async fn update_candidate_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .candidate_service
        .apply_status_transition(id, payload)
        .await?;
    Ok(Json(candidate))
}

pub async fn delete_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.candidate_service.delete_candidate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop the current (head) meet: clear the root link and pop the first
/// interview.
pub async fn remove_head_meet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.candidate_service.remove_head_meet(id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn candidate_metrics(
    State(state): State<AppState>,
    Query(range): Query<MetricsQuery>,
) -> Result<impl IntoResponse> {
    let config = crate::config::get_config();
    let from = range.from.unwrap_or(DateTime::UNIX_EPOCH);
    let to = range
        .to
        .unwrap_or_else(|| Utc.with_ymd_and_hms(2999, 12, 31, 23, 59, 59).unwrap());
    let metrics = state
        .candidate_service
        .metrics(config.timezone.name(), from, to)
        .await?;
    Ok(Json(metrics))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(range): Query<SnapshotRangeQuery>,
) -> Result<impl IntoResponse> {
    let from = range.from.as_deref().and_then(parse_year_month);
    let to = range.to.as_deref().and_then(parse_year_month);
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(Json(json!({ "items": [] })));
    };
    let items = state.candidate_service.list_snapshots(from, to).await?;
    Ok(Json(json!({ "items": items })))
}

#[derive(Debug, Deserialize)]
pub struct FreezeQuery {
    pub month: Option<String>,
}

pub async fn freeze_snapshot(
    State(state): State<AppState>,
    Query(query): Query<FreezeQuery>,
) -> Result<impl IntoResponse> {
    let month = query
        .month
        .as_deref()
        .and_then(parse_year_month)
        .unwrap_or_else(|| previous_month(Utc::now().date_naive()));
    let snapshot = state.candidate_service.freeze_snapshot(month).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}
