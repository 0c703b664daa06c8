/* src/cli/src/main.rs */

mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use preview_orchestrator::Orchestrator;
use preview_pm::PackageManager;

#[derive(Parser)]
#[command(name = "preview-runner", about = "Per-node control plane for project dev-server previews")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run a single project behind the proxy until interrupted
  Preview {
    /// Directory containing the project (defaults to the current directory)
    project_path: Option<PathBuf>,
    #[arg(long, default_value = "pnpm")]
    package_manager: String,
    /// Fixed public port the proxy listens on
    #[arg(long, default_value_t = 3000)]
    port: u16,
  },
  /// Run the multi-project control-plane HTTP API
  Control {
    #[arg(long, env = "CONTROL_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = "CONTROL_PORT", default_value_t = 8088)]
    port: u16,
    #[arg(long, env = "PROXY_PORT", default_value_t = 3000)]
    proxy_port: u16,
    #[arg(long, default_value = "pnpm")]
    package_manager: String,
  },
}

fn exe_dir() -> Result<PathBuf> {
  let exe = std::env::current_exe().context("failed to locate current executable")?;
  Ok(exe.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")))
}

/// Pick a free ephemeral TCP port for the dev server to bind locally.
fn allocate_ephemeral_port() -> Result<u16> {
  let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).context("failed to bind ephemeral port")?;
  Ok(listener.local_addr()?.port())
}

/// Load `.env.production` or `.env.development` per `ENV`, falling back to
/// plain `.env` (spec.md §6).
fn load_environment() {
  let env_name = std::env::var("ENV").unwrap_or_default();
  let specific = if env_name == "production" { ".env.production" } else { ".env.development" };
  if dotenvy::from_filename(specific).is_err() {
    dotenvy::dotenv().ok();
  }
}

async fn run_preview(project_path: Option<PathBuf>, package_manager: String, port: u16) -> Result<()> {
  ui::banner("preview");
  let project_path = project_path.unwrap_or_else(|| PathBuf::from("."));
  let pm = PackageManager::parse(&package_manager).map_err(|e| anyhow::anyhow!(e.message().to_string()))?;
  let exe_dir = exe_dir()?;
  let upstream_port = allocate_ephemeral_port()?;

  ui::arrow(&format!("starting {} on port {port}", project_path.display()));
  let orchestrator = Orchestrator::new(project_path, exe_dir, pm);
  if let Err(err) = orchestrator.restart(port, upstream_port).await {
    ui::fail(err.message());
    return Err(anyhow::anyhow!(err.message().to_string())).context("failed to start preview");
  }

  ui::ok(&format!("ready at http://127.0.0.1:{port} (press Ctrl+C to stop)"));
  tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
  orchestrator.stop().await.map_err(|e| anyhow::anyhow!(e.message().to_string()))?;
  Ok(())
}

async fn run_control(host: String, port: u16, proxy_port: u16, package_manager: String) -> Result<()> {
  load_environment();

  let workspace_path = std::env::var("WORKSPACE_PATH").context("WORKSPACE_PATH must be set")?;
  let workspace_root = PathBuf::from(workspace_path);
  let default_pm = PackageManager::parse(&package_manager).map_err(|e| anyhow::anyhow!(e.message().to_string()))?;
  let exe_dir = exe_dir()?;

  let config = preview_api::ControlConfig { host, port, workspace_root, proxy_port, exe_dir, default_pm };
  preview_api::serve(config).await.map_err(|e| anyhow::anyhow!(e.message().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::Preview { project_path, package_manager, port } => {
      run_preview(project_path, package_manager, port).await
    }
    Command::Control { host, port, proxy_port, package_manager } => {
      run_control(host, port, proxy_port, package_manager).await
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocates_nonzero_port() {
    assert!(allocate_ephemeral_port().unwrap() > 0);
  }

  #[test]
  fn exe_dir_resolves_to_a_directory() {
    assert!(exe_dir().unwrap().is_dir());
  }
}
