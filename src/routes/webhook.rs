use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use validator::Validate;

use crate::dto::webhook_dto::JiraInterviewPayload;
use crate::error::Result;
use crate::AppState;

pub async fn handle_jira_interview(
    State(state): State<AppState>,
    Json(payload): Json<JiraInterviewPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let candidate = state.candidate_service.ingest_jira_interview(&payload).await?;
    Ok(Json(json!({ "ok": true, "candidate": candidate })))
}
