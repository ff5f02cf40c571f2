use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::employee_dto::UpdateEmployeePayload;
use crate::dto::Pagination;
use crate::error::Result;
use crate::AppState;

pub async fn list_employees(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let response = state.employee_service.list_employees(pagination).await?;
    Ok(Json(response))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let employee = state.employee_service.update_employee(id, payload).await?;
    Ok(Json(employee))
}
