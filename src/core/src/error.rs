/* src/core/src/error.rs */

use std::fmt;

/// Application error carrying an HTTP status, a stable code, and a
/// human-readable message. Mirrors the shape every layer needs: the CLI
/// prints `message`, the HTTP API maps `status` to a response and `code`
/// into the JSON body.
#[derive(Debug, Clone)]
pub struct RunnerError {
  code: String,
  message: String,
  status: u16,
}

fn default_status(code: &str) -> u16 {
  match code {
    "INVALID_ARGUMENT" => 400,
    "NOT_FOUND" => 404,
    "ALREADY_RUNNING" => 409,
    "UNAVAILABLE" => 503,
    "INTERNAL" => 500,
    _ => 500,
  }
}

impl RunnerError {
  pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
    Self { code: code.into(), message: message.into(), status }
  }

  pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
    let code = code.into();
    let status = default_status(&code);
    Self { code, message: message.into(), status }
  }

  pub fn invalid_argument(msg: impl Into<String>) -> Self {
    Self::with_code("INVALID_ARGUMENT", msg)
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::with_code("NOT_FOUND", msg)
  }

  pub fn already_running(msg: impl Into<String>) -> Self {
    Self::with_code("ALREADY_RUNNING", msg)
  }

  pub fn unavailable(msg: impl Into<String>) -> Self {
    Self::with_code("UNAVAILABLE", msg)
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::with_code("INTERNAL", msg)
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn status(&self) -> u16 {
    self.status
  }
}

impl fmt::Display for RunnerError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for RunnerError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_status_known_codes() {
    assert_eq!(default_status("INVALID_ARGUMENT"), 400);
    assert_eq!(default_status("NOT_FOUND"), 404);
    assert_eq!(default_status("ALREADY_RUNNING"), 409);
    assert_eq!(default_status("UNAVAILABLE"), 503);
    assert_eq!(default_status("INTERNAL"), 500);
  }

  #[test]
  fn default_status_unknown_code() {
    assert_eq!(default_status("WHATEVER"), 500);
  }

  #[test]
  fn convenience_constructors() {
    assert_eq!(RunnerError::invalid_argument("x").status(), 400);
    assert_eq!(RunnerError::not_found("x").status(), 404);
    assert_eq!(RunnerError::already_running("x").status(), 409);
    assert_eq!(RunnerError::unavailable("x").status(), 503);
    assert_eq!(RunnerError::internal("x").status(), 500);
  }

  #[test]
  fn display_format() {
    let err = RunnerError::not_found("missing project");
    assert_eq!(err.to_string(), "NOT_FOUND: missing project");
  }
}
