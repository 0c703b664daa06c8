/* src/api/src/lib.rs */

mod error;
mod handlers;
mod port;
mod state;

use std::path::PathBuf;

use axum::routing::{get, post};
use axum::Router;
use preview_core::RunnerError;
use preview_pm::PackageManager;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Everything `serve` needs to bind and run the control API, gathered once
/// at the `control` subcommand entry point and handed down as a single unit.
#[derive(Clone)]
pub struct ControlConfig {
  pub host: String,
  pub port: u16,
  pub workspace_root: PathBuf,
  pub proxy_port: u16,
  pub exe_dir: PathBuf,
  pub default_pm: PackageManager,
}

/// Build the control-plane router (spec.md §4.6): project lifecycle,
/// filesystem read, and git-history routes over a shared `AppState`.
pub fn build_router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(handlers::health::health))
    .route("/check-preview", get(handlers::health::check_preview))
    .route("/projects/start", post(handlers::projects::start))
    .route("/projects/stop", post(handlers::projects::stop))
    .route("/projects/lint", post(handlers::projects::lint))
    .route("/projects/check-errors", post(handlers::projects::check_errors))
    .route("/projects/add-package", post(handlers::projects::add_package))
    .route("/files/tree", get(handlers::files::tree))
    .route("/files/content", get(handlers::files::content))
    .route("/git/commits", get(handlers::git::commits))
    .route("/git/commits/diff", get(handlers::git::diff))
    .route("/git/commits/file_diff", get(handlers::git::file_diff))
    .route("/git/commits/switch", post(handlers::git::switch))
    .layer(CatchPanicLayer::new())
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

/// Bind and serve the control API on `config.host:config.port` until the
/// process is killed. `config.workspace_root` is created if it does not
/// already exist.
pub async fn serve(config: ControlConfig) -> Result<(), RunnerError> {
  let ControlConfig { host, port, workspace_root, proxy_port, exe_dir, default_pm } = config;

  if !workspace_root.is_dir() {
    std::fs::create_dir_all(&workspace_root)
      .map_err(|e| RunnerError::internal(format!("failed to create workspace root: {e}")))?;
  }

  let state = AppState::new(workspace_root, proxy_port, exe_dir, default_pm);
  let app = build_router(state);

  let addr = format!("{host}:{port}");
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .map_err(|e| RunnerError::unavailable(format!("failed to bind {addr}: {e}")))?;
  tracing::info!(%addr, "control API listening");

  axum::serve(listener, app).await.map_err(|e| RunnerError::internal(format!("server error: {e}")))
}
