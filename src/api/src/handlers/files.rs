/* src/api/src/handlers/files.rs */

use axum::extract::{Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use preview_core::RunnerError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::{normalize_file_path, AppState};

#[derive(Deserialize)]
pub struct ProjectIdQuery {
  project_id: String,
}

pub async fn tree(
  State(state): State<AppState>,
  Query(query): Query<ProjectIdQuery>,
) -> Result<Json<Value>, ApiError> {
  let project_dir = state.project_dir(&query.project_id)?;
  let nodes = preview_fswalk::walk(&project_dir);
  Ok(Json(serde_json::to_value(nodes).map_err(|e| RunnerError::internal(e.to_string()))?))
}

#[derive(Deserialize)]
pub struct FileContentQuery {
  project_id: String,
  file_path: String,
}

pub async fn content(
  State(state): State<AppState>,
  Query(query): Query<FileContentQuery>,
) -> Result<Json<Value>, ApiError> {
  let project_dir = state.project_dir(&query.project_id)?;
  let relative = normalize_file_path(&query.file_path);
  let candidate = project_dir.join(&relative);

  let project_dir_resolved = project_dir
    .canonicalize()
    .map_err(|_| RunnerError::invalid_argument("project directory not found"))?;
  let resolved = candidate
    .canonicalize()
    .map_err(|_| RunnerError::invalid_argument("file not found"))?;

  if !resolved.starts_with(&project_dir_resolved) {
    return Err(RunnerError::invalid_argument("file_path escapes project directory").into());
  }
  if resolved.is_dir() {
    return Err(RunnerError::invalid_argument("file_path is a directory").into());
  }

  let bytes = std::fs::read(&resolved).map_err(|e| RunnerError::internal(e.to_string()))?;
  let mime_type = infer::get(&bytes)
    .map(|kind| kind.mime_type().to_string())
    .unwrap_or_else(|| mime_guess::from_path(&resolved).first_or_octet_stream().to_string());

  Ok(Json(json!({ "content": BASE64.encode(&bytes), "mimeType": mime_type })))
}
