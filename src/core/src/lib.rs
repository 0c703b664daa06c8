/* src/core/src/lib.rs */

pub mod error;
pub mod model;

pub use error::RunnerError;
pub use model::{ChangeKind, ChangedFile, CommitRecord, FileTreeNode, is_skipped_dir};
