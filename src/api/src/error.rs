/* src/api/src/error.rs */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use preview_core::RunnerError;
use serde_json::json;

/// Wraps [`RunnerError`] so handlers can `?`-propagate it and get the
/// `{code, message}` JSON body spec.md §7 expects.
pub struct ApiError(pub RunnerError);

impl From<RunnerError> for ApiError {
  fn from(err: RunnerError) -> Self {
    Self(err)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "code": self.0.code(), "message": self.0.message() }))).into_response()
  }
}
