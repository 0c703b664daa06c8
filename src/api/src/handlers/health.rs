/* src/api/src/handlers/health.rs */

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health() -> StatusCode {
  StatusCode::OK
}

#[derive(Deserialize)]
pub struct CheckPreviewQuery {
  project_id: String,
}

pub async fn check_preview(
  State(state): State<AppState>,
  Query(query): Query<CheckPreviewQuery>,
) -> (StatusCode, Json<Value>) {
  let healthy = match state.existing_orchestrator(&query.project_id).await {
    Some(orchestrator) => orchestrator.is_running().await,
    None => false,
  };
  let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
  (status, Json(json!({ "healthy": healthy })))
}
