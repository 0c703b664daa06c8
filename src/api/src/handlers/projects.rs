/* src/api/src/handlers/projects.rs */

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use preview_core::RunnerError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::port::allocate_ephemeral_port;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProjectIdBody {
  project_id: String,
}

/// Stops every other project, allocates a fresh upstream port, and restarts
/// this one (spec.md §4.6, §5).
pub async fn start(
  State(state): State<AppState>,
  Json(body): Json<ProjectIdBody>,
) -> Result<StatusCode, ApiError> {
  let project_dir = state.project_dir(&body.project_id)?;
  if !project_dir.is_dir() {
    return Err(RunnerError::invalid_argument(format!("project directory not found: {body.project_id}")).into());
  }

  state.stop_all_projects_except(Some(&body.project_id)).await;

  let orchestrator = state.get_or_create_orchestrator(&body.project_id).await?;
  let upstream_port = allocate_ephemeral_port()?;
  orchestrator.restart(state.proxy_port, upstream_port).await?;
  Ok(StatusCode::CREATED)
}

pub async fn stop(
  State(state): State<AppState>,
  Json(body): Json<ProjectIdBody>,
) -> Result<StatusCode, ApiError> {
  let orchestrator = state.get_or_create_orchestrator(&body.project_id).await?;
  orchestrator.stop().await?;
  Ok(StatusCode::OK)
}

pub async fn lint(
  State(state): State<AppState>,
  Json(body): Json<ProjectIdBody>,
) -> Result<Json<Value>, ApiError> {
  let orchestrator = state.get_or_create_orchestrator(&body.project_id).await?;
  let (success, message) = orchestrator.run_lint().await;
  Ok(Json(json!({ "message": message, "lintErrors": !success })))
}

pub async fn check_errors(
  State(state): State<AppState>,
  Json(body): Json<ProjectIdBody>,
) -> Result<Json<Value>, ApiError> {
  let orchestrator = state.get_or_create_orchestrator(&body.project_id).await?;
  let (success, message) = orchestrator.check_build_errors().await;
  Ok(Json(json!({ "message": message, "buildErrors": !success })))
}

#[derive(Deserialize)]
pub struct AddPackageBody {
  project_id: String,
  package_name: String,
  #[serde(default)]
  restart_server: bool,
}

pub async fn add_package(
  State(state): State<AppState>,
  Json(body): Json<AddPackageBody>,
) -> Result<Json<Value>, ApiError> {
  let orchestrator = state.get_or_create_orchestrator(&body.project_id).await?;
  let (success, mut message) = orchestrator.add_package(&body.package_name).await;

  if body.restart_server && success {
    state.stop_all_projects_except(Some(&body.project_id)).await;
    let restart_result = match allocate_ephemeral_port() {
      Ok(upstream_port) => orchestrator.restart(state.proxy_port, upstream_port).await,
      Err(err) => Err(err),
    };
    match restart_result {
      Ok(()) => message.push_str("\nrestart: ok"),
      Err(err) => message.push_str(&format!("\nrestart failed: {}", err.message())),
    }
  }

  Ok(Json(json!({ "message": message, "success": success })))
}
