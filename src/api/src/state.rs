/* src/api/src/state.rs */

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use preview_core::RunnerError;
use preview_orchestrator::Orchestrator;
use preview_pm::PackageManager;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
  pub workspace_root: PathBuf,
  pub proxy_port: u16,
  pub exe_dir: PathBuf,
  pub default_pm: PackageManager,
  registry: Arc<Mutex<HashMap<String, Arc<Orchestrator>>>>,
}

impl AppState {
  pub fn new(workspace_root: PathBuf, proxy_port: u16, exe_dir: PathBuf, default_pm: PackageManager) -> Self {
    Self { workspace_root, proxy_port, exe_dir, default_pm, registry: Arc::new(Mutex::new(HashMap::new())) }
  }

  /// Resolve `project_id` to its directory under the workspace root,
  /// rejecting ids that would escape it.
  pub fn project_dir(&self, project_id: &str) -> Result<PathBuf, RunnerError> {
    if project_id.is_empty() || project_id.contains("..") || project_id.starts_with('/') {
      return Err(RunnerError::invalid_argument("invalid project_id"));
    }
    Ok(self.workspace_root.join(project_id))
  }

  pub async fn existing_orchestrator(&self, project_id: &str) -> Option<Arc<Orchestrator>> {
    self.registry.lock().await.get(project_id).cloned()
  }

  pub async fn get_or_create_orchestrator(&self, project_id: &str) -> Result<Arc<Orchestrator>, RunnerError> {
    let mut registry = self.registry.lock().await;
    if let Some(existing) = registry.get(project_id) {
      return Ok(existing.clone());
    }
    let project_dir = self.project_dir(project_id)?;
    let orchestrator =
      Arc::new(Orchestrator::new(project_dir, self.exe_dir.clone(), self.default_pm));
    registry.insert(project_id.to_string(), orchestrator.clone());
    Ok(orchestrator)
  }

  /// Stop every registered orchestrator other than `except`, enforcing the
  /// one-proxy-port rule (spec.md §5).
  pub async fn stop_all_projects_except(&self, except: Option<&str>) {
    let orchestrators: Vec<Arc<Orchestrator>> = {
      let registry = self.registry.lock().await;
      registry
        .iter()
        .filter(|(id, _)| except != Some(id.as_str()))
        .map(|(_, orch)| orch.clone())
        .collect()
    };
    for orchestrator in orchestrators {
      let _ = orchestrator.stop().await;
    }
  }
}

/// Normalize `/` and `\` to the platform separator before resolution
/// (spec.md §6).
pub fn normalize_file_path(raw: &str) -> PathBuf {
  let normalized: String = raw
    .chars()
    .map(|c| if c == '/' || c == '\\' { std::path::MAIN_SEPARATOR } else { c })
    .collect();
  PathBuf::from(normalized)
}
