/* src/core/src/model.rs */

use serde::{Deserialize, Serialize};

/// One entry in a git commit's changed-file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
  Added,
  Modified,
  Deleted,
}

impl ChangeKind {
  /// Map a `git show --name-status` letter. Anything unrecognized is
  /// treated as `Modified` (spec.md §4.6, `/git/commits`).
  pub fn from_status_letter(letter: &str) -> Self {
    match letter {
      "A" => Self::Added,
      "D" => Self::Deleted,
      _ => Self::Modified,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
  pub path: String,
  pub kind: ChangeKind,
}

/// A single commit, as derived from `git log` + `git show` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
  pub hash: String,
  pub date: String,
  pub subject: String,
  #[serde(rename = "changedFiles")]
  pub changed_files: Vec<ChangedFile>,
}

/// One node of a pruned project file tree (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileTreeNode {
  File { name: String },
  Folder { name: String, children: Vec<FileTreeNode> },
}

/// Directory names pruned from the walk, case-insensitively (spec.md §3).
pub const SKIP_DIRS: &[&str] = &[
  "node_modules",
  "__pycache__",
  ".git",
  ".next",
  "dist",
  "build",
  ".venv",
  "venv",
  ".env",
  ".mypy_cache",
  ".pytest_cache",
  ".codepanda",
];

pub fn is_skipped_dir(name: &str) -> bool {
  let lower = name.to_lowercase();
  SKIP_DIRS.iter().any(|skip| *skip == lower)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_letter_mapping() {
    assert_eq!(ChangeKind::from_status_letter("A"), ChangeKind::Added);
    assert_eq!(ChangeKind::from_status_letter("M"), ChangeKind::Modified);
    assert_eq!(ChangeKind::from_status_letter("D"), ChangeKind::Deleted);
    assert_eq!(ChangeKind::from_status_letter("R100"), ChangeKind::Modified);
  }

  #[test]
  fn skip_dirs_case_insensitive() {
    assert!(is_skipped_dir("node_modules"));
    assert!(is_skipped_dir("Node_Modules"));
    assert!(is_skipped_dir(".GIT"));
    assert!(!is_skipped_dir("src"));
  }
}
