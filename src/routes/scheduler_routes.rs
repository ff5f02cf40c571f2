use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::Result;
use crate::AppState;

/// Manual tick, same code path as the live timer. Handy for smoke checks
/// and for tests that want a deterministic evaluation pass.
pub async fn run_tick(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let report = state.scheduler.run_tick_once().await?;
    Ok(Json(report))
}
