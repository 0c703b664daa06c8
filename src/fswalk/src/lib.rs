/* src/fswalk/src/lib.rs */

use std::path::Path;

use preview_core::{FileTreeNode, is_skipped_dir};

/// Depth-first walk from `root`, pruning directories named in the skip set
/// (case-insensitive). I/O errors on individual entries are skipped rather
/// than aborting the walk (spec.md §4.7).
pub fn walk(root: &Path) -> Vec<FileTreeNode> {
  let mut entries = match std::fs::read_dir(root) {
    Ok(entries) => entries.filter_map(Result::ok).collect::<Vec<_>>(),
    Err(_) => return Vec::new(),
  };
  entries.sort_by_key(|e| e.file_name());

  let mut nodes = Vec::new();
  for entry in entries {
    let name = entry.file_name().to_string_lossy().into_owned();
    let Ok(file_type) = entry.file_type() else { continue };

    if file_type.is_dir() {
      if is_skipped_dir(&name) {
        continue;
      }
      let children = walk(&entry.path());
      nodes.push(FileTreeNode::Folder { name, children });
    } else if file_type.is_file() {
      nodes.push(FileTreeNode::File { name });
    }
    // Symlinks and other special files are neither: skip silently.
  }
  nodes
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  #[test]
  fn prunes_skip_dirs() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    fs::write(dir.path().join("node_modules/pkg.json"), "{}").unwrap();
    fs::write(dir.path().join("index.ts"), "").unwrap();

    let tree = walk(dir.path());
    assert_eq!(tree.len(), 1);
    assert!(matches!(&tree[0], FileTreeNode::File { name } if name == "index.ts"));
  }

  #[test]
  fn nested_folders_preserved() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/main.rs"), "").unwrap();

    let tree = walk(dir.path());
    assert_eq!(tree.len(), 1);
    match &tree[0] {
      FileTreeNode::Folder { name, children } => {
        assert_eq!(name, "src");
        assert_eq!(children.len(), 1);
      }
      _ => panic!("expected folder"),
    }
  }

  #[test]
  fn skip_dir_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("Node_Modules")).unwrap();
    let tree = walk(dir.path());
    assert!(tree.is_empty());
  }

  #[test]
  fn missing_root_returns_empty() {
    let tree = walk(Path::new("/definitely/does/not/exist"));
    assert!(tree.is_empty());
  }
}
