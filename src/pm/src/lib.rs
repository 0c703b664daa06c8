/* src/pm/src/lib.rs */

use preview_core::RunnerError;

/// The closed set of supported toolchains (spec.md §4.1). No other crate
/// forms a package-manager command line directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
  Npm,
  Yarn,
  Pnpm,
}

impl PackageManager {
  pub fn parse(s: &str) -> Result<Self, RunnerError> {
    match s {
      "npm" => Ok(Self::Npm),
      "yarn" => Ok(Self::Yarn),
      "pnpm" => Ok(Self::Pnpm),
      other => Err(RunnerError::invalid_argument(format!("unknown package manager \"{other}\""))),
    }
  }

  /// Parse, silently falling back to pnpm on an unrecognized value
  /// (spec.md §4.1, `is_valid` guard used by callers that read configured
  /// strings rather than user input).
  pub fn parse_or_default(s: &str) -> Self {
    Self::parse(s).unwrap_or(Self::Pnpm)
  }

  pub fn is_valid(s: &str) -> bool {
    Self::parse(s).is_ok()
  }

  fn bin(self) -> &'static str {
    match self {
      Self::Npm => "npm",
      Self::Yarn => "yarn",
      Self::Pnpm => "pnpm",
    }
  }

  pub fn install_cmd(self) -> String {
    format!("{} install", self.bin())
  }

  pub fn dev_cmd(self, port: u16) -> String {
    format!("{} run dev --port {port}", self.bin())
  }

  pub fn lint_cmd(self) -> String {
    format!("{} run lint", self.bin())
  }

  pub fn build_cmd(self) -> String {
    format!("{} run build", self.bin())
  }

  /// Incremental type-check only, not a full build: cheap enough to run on
  /// every edit (spec.md §4.1).
  pub fn type_check_cmd(self) -> String {
    match self {
      Self::Npm => {
        "npm exec -- tsc --noEmit --incremental -p tsconfig.app.json".to_string()
      }
      Self::Yarn => "yarn exec tsc --noEmit --incremental -p tsconfig.app.json".to_string(),
      Self::Pnpm => {
        "pnpm exec -- tsc --noEmit --incremental -p tsconfig.app.json".to_string()
      }
    }
  }

  pub fn add_package_cmd(self, name: &str) -> String {
    format!("{} add {name}", self.bin())
  }
}

impl std::fmt::Display for PackageManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.bin())
  }
}
