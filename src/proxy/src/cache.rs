/* src/proxy/src/cache.rs */

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use bytes::Bytes;
use preview_core::RunnerError;

const ASSETS: &[&str] = &["loading.html", "heartbeat.js", "navigation.js"];

/// The three static assets the proxy serves/injects, preloaded once at
/// construction and held for read concurrency (spec.md §4.4).
pub struct StaticCache {
  files: RwLock<HashMap<&'static str, Bytes>>,
}

impl StaticCache {
  /// Load from `<exe_dir>/static/<name>`, falling back to `./static/<name>`.
  pub fn load(exe_dir: &Path) -> Result<Self, RunnerError> {
    let mut files = HashMap::with_capacity(ASSETS.len());
    for name in ASSETS {
      let primary = exe_dir.join("static").join(name);
      let fallback = Path::new("./static").join(name);
      let bytes = std::fs::read(&primary).or_else(|_| std::fs::read(&fallback)).map_err(|_| {
        RunnerError::not_found(format!(
          "static asset {name} missing from {} and {}",
          primary.display(),
          fallback.display()
        ))
      })?;
      files.insert(*name, Bytes::from(bytes));
    }
    Ok(Self { files: RwLock::new(files) })
  }

  pub fn loading_html(&self) -> Bytes {
    self.get("loading.html")
  }

  pub fn heartbeat_js(&self) -> String {
    String::from_utf8_lossy(&self.get("heartbeat.js")).into_owned()
  }

  pub fn navigation_js(&self) -> String {
    String::from_utf8_lossy(&self.get("navigation.js")).into_owned()
  }

  fn get(&self, name: &str) -> Bytes {
    self.files.read().expect("static cache lock poisoned").get(name).cloned().unwrap_or_default()
  }
}
