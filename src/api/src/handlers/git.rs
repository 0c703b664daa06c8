/* src/api/src/handlers/git.rs */

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use preview_core::{ChangeKind, ChangedFile, CommitRecord, RunnerError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tokio::process::Command;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const LOG_FORMAT: &str = "%ai %H %d %s [%an]";

fn ensure_git_repo(project_dir: &Path) -> Result<(), RunnerError> {
  if !project_dir.join(".git").exists() {
    return Err(RunnerError::invalid_argument("not a git repository"));
  }
  Ok(())
}

async fn run_git(project_dir: &Path, args: &[&str]) -> Result<String, RunnerError> {
  let output = Command::new("git")
    .current_dir(project_dir)
    .args(args)
    .output()
    .await
    .map_err(|e| RunnerError::internal(format!("failed to run git {args:?}: {e}")))?;
  Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse one `git log --pretty=format:"%ai %H %d %s [%an]"` line into
/// (date, hash, subject). The subject is everything between the
/// parenthesized ref list (if present) and the trailing ` [author]` tag;
/// stripping that tag is a heuristic that mistakes a subject genuinely
/// ending in `[...]` for an author marker (spec.md §9).
fn parse_log_line(line: &str) -> Option<(String, String, String)> {
  let mut fields = line.splitn(4, ' ');
  let date_parts: Vec<&str> = (0..3).filter_map(|_| fields.next()).collect();
  if date_parts.len() < 3 {
    return None;
  }
  let date = date_parts.join(" ");
  let rest = fields.next()?;

  let mut parts = rest.splitn(2, ' ');
  let hash = parts.next()?.to_string();
  let mut remainder = parts.next().unwrap_or("").trim();

  if let Some(stripped) = remainder.strip_prefix('(') {
    if let Some(end) = stripped.find(')') {
      remainder = stripped[end + 1..].trim();
    }
  }

  let subject = match remainder.rfind(" [") {
    Some(idx) if remainder.ends_with(']') => remainder[..idx].to_string(),
    _ => remainder.to_string(),
  };

  Some((date, hash, subject))
}

async fn changed_files(project_dir: &Path, hash: &str) -> Vec<ChangedFile> {
  let Ok(raw) = run_git(project_dir, &["show", "--name-status", "--pretty=format:", hash]).await else {
    return Vec::new();
  };
  raw
    .lines()
    .filter_map(|line| {
      let mut parts = line.splitn(2, '\t');
      let status = parts.next()?.trim();
      let path = parts.next()?.trim().to_string();
      if path.is_empty() {
        return None;
      }
      let letter = &status[..1.min(status.len())];
      Some(ChangedFile { path, kind: ChangeKind::from_status_letter(letter) })
    })
    .collect()
}

#[derive(Deserialize)]
pub struct CommitsQuery {
  project_id: String,
  limit: Option<usize>,
  cursor: Option<String>,
}

pub async fn commits(
  State(state): State<AppState>,
  Query(query): Query<CommitsQuery>,
) -> Result<Json<Value>, ApiError> {
  let project_dir = state.project_dir(&query.project_id)?;
  ensure_git_repo(&project_dir)?;
  let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);

  let raw = run_git(&project_dir, &["--no-pager", "log", &format!("--pretty=format:{LOG_FORMAT}")]).await?;
  let all: Vec<(String, String, String)> = raw.lines().filter_map(parse_log_line).collect();

  let start = match &query.cursor {
    Some(cursor) => all.iter().position(|(_, hash, _)| hash == cursor).map(|idx| idx + 1).unwrap_or(all.len()),
    None => 0,
  };
  let page = &all[start.min(all.len())..];
  let has_next_page = page.len() > limit;
  let page = &page[..page.len().min(limit)];

  let mut commits = Vec::with_capacity(page.len());
  for (date, hash, subject) in page {
    let files = changed_files(&project_dir, hash).await;
    commits.push(CommitRecord { hash: hash.clone(), date: date.clone(), subject: subject.clone(), changed_files: files });
  }
  let next_cursor = if has_next_page { page.last().map(|(_, hash, _)| hash.clone()) } else { None };

  Ok(Json(json!({ "commits": commits, "has_next_page": has_next_page, "next_cursor": next_cursor })))
}

async fn show_blob(project_dir: &Path, revision: &str, file_path: &str) -> String {
  run_git(project_dir, &["show", &format!("{revision}:{file_path}")]).await.unwrap_or_default()
}

#[derive(Deserialize)]
pub struct CommitDiffQuery {
  project_id: String,
  commit_hash: String,
}

pub async fn diff(
  State(state): State<AppState>,
  Query(query): Query<CommitDiffQuery>,
) -> Result<Json<Value>, ApiError> {
  let project_dir = state.project_dir(&query.project_id)?;
  ensure_git_repo(&project_dir)?;

  let files = changed_files(&project_dir, &query.commit_hash).await;
  let mut result = Vec::with_capacity(files.len());
  for file in files {
    let old_text = show_blob(&project_dir, &format!("{}^", query.commit_hash), &file.path).await;
    let new_text = show_blob(&project_dir, &query.commit_hash, &file.path).await;
    result.push(json!({ "path": file.path, "old_text": old_text, "new_text": new_text }));
  }
  Ok(Json(json!(result)))
}

#[derive(Deserialize)]
pub struct FileDiffQuery {
  project_id: String,
  commit_hash: String,
  file_path: String,
}

pub async fn file_diff(
  State(state): State<AppState>,
  Query(query): Query<FileDiffQuery>,
) -> Result<Json<Value>, ApiError> {
  let project_dir = state.project_dir(&query.project_id)?;
  ensure_git_repo(&project_dir)?;

  let old_text = show_blob(&project_dir, &format!("{}^", query.commit_hash), &query.file_path).await;
  let new_text = show_blob(&project_dir, &query.commit_hash, &query.file_path).await;
  Ok(Json(json!({ "path": query.file_path, "old_text": old_text, "new_text": new_text })))
}

#[derive(Deserialize)]
pub struct SwitchCommitBody {
  project_id: String,
  commit_hash: String,
}

/// Discards working-tree changes by design: `git reset --hard` gives no
/// opportunity to stash or confirm (spec.md §9).
pub async fn switch(
  State(state): State<AppState>,
  Json(body): Json<SwitchCommitBody>,
) -> Result<StatusCode, ApiError> {
  let project_dir = state.project_dir(&body.project_id)?;
  ensure_git_repo(&project_dir)?;

  let output = Command::new("git")
    .current_dir(&project_dir)
    .args(["reset", "--hard", &body.commit_hash])
    .output()
    .await
    .map_err(|e| RunnerError::internal(format!("failed to run git reset: {e}")))?;

  if !output.status.success() {
    return Err(RunnerError::invalid_argument(String::from_utf8_lossy(&output.stderr).into_owned()).into());
  }
  Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_subject() {
    let line = "2024-01-02 10:00:00 +0000 abc123  fix: handle empty input [Jane Doe]";
    let (date, hash, subject) = parse_log_line(line).unwrap();
    assert_eq!(date, "2024-01-02 10:00:00 +0000");
    assert_eq!(hash, "abc123");
    assert_eq!(subject, "fix: handle empty input");
  }

  #[test]
  fn strips_ref_list_and_author_tag() {
    let line = "2024-01-02 10:00:00 +0000 abc123 (HEAD -> main, origin/main) add feature [Jane Doe]";
    let (_, _, subject) = parse_log_line(line).unwrap();
    assert_eq!(subject, "add feature");
  }

  #[test]
  fn no_ref_list_present() {
    let line = "2024-01-02 10:00:00 +0000 abc123  tidy up [Jane Doe]";
    let (_, _, subject) = parse_log_line(line).unwrap();
    assert_eq!(subject, "tidy up");
  }

  #[test]
  fn malformed_line_returns_none() {
    assert!(parse_log_line("too short").is_none());
  }
}
