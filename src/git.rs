use std::process::{Command, Output};

use crate::error::{BotError, Result};

/// Change kinds reported as modified: added, modified, type-changed
const MODIFIED_STATUSES: [char; 3] = ['A', 'M', 'T'];

fn run_git(args: &[&str], dir: &str) -> Result<Output> {
   Command::new("git")
      .args(args)
      .current_dir(dir)
      .output()
      .map_err(|e| BotError::GitError(format!("Failed to run git {}: {e}", args.join(" "))))
}

/// Fail with `NotAGitRepository` unless `dir` is inside a work tree
pub fn ensure_work_tree(dir: &str) -> Result<()> {
   let output = run_git(&["rev-parse", "--is-inside-work-tree"], dir)?;
   if output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true" {
      return Ok(());
   }
   Err(BotError::NotAGitRepository { path: dir.to_string() })
}

/// Paths added, modified or type-changed between `base` and `head`
pub fn modified_files(dir: &str, base: &str, head: &str) -> Result<Vec<String>> {
   ensure_work_tree(dir)?;

   let output = run_git(&["diff", "--name-status", "--no-renames", base, head], dir)?;
   if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(BotError::GitError(format!("git diff --name-status failed: {stderr}")));
   }

   let stdout = String::from_utf8_lossy(&output.stdout);
   Ok(parse_name_status(&stdout))
}

/// Keep the path of every `A`/`M`/`T` line of `git diff --name-status`
fn parse_name_status(listing: &str) -> Vec<String> {
   listing
      .lines()
      .filter_map(|line| {
         let (status, path) = line.split_once('\t')?;
         let kind = status.chars().next()?;
         MODIFIED_STATUSES
            .contains(&kind)
            .then(|| path.to_string())
      })
      .collect()
}

/// Subjects of the commits in `base..head`, oldest first
pub fn commit_subjects(dir: &str, base: &str, head: &str) -> Result<Vec<String>> {
   ensure_work_tree(dir)?;

   let range = format!("{base}..{head}");
   let output = run_git(&["log", "--reverse", "--format=%s", &range], dir)?;
   if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(BotError::GitError(format!("git log failed: {stderr}")));
   }

   let stdout = String::from_utf8_lossy(&output.stdout);
   Ok(stdout
      .lines()
      .filter(|s| !s.is_empty())
      .map(|s| s.to_string())
      .collect())
}

#[cfg(test)]
mod tests {
   use std::fs;

   use tempfile::TempDir;

   use super::*;

   fn git(dir: &str, args: &[&str]) -> String {
      let output = Command::new("git")
         .args(args)
         .current_dir(dir)
         .output()
         .unwrap();
      assert!(output.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&output.stderr));
      String::from_utf8_lossy(&output.stdout).trim().to_string()
   }

   fn commit_all(dir: &str, subject: &str) -> String {
      git(dir, &["add", "-A"]);
      git(dir, &["commit", "-q", "-m", subject]);
      git(dir, &["rev-parse", "HEAD"])
   }

   fn init_repo() -> TempDir {
      let tmp = TempDir::new().unwrap();
      let dir = tmp.path().to_str().unwrap();
      git(dir, &["init", "-q"]);
      git(dir, &["config", "user.email", "bot@example.com"]);
      git(dir, &["config", "user.name", "Bot"]);
      git(dir, &["config", "commit.gpgsign", "false"]);
      tmp
   }

   #[test]
   fn test_parse_name_status_keeps_added_modified_typechanged() {
      let listing = "A\tsrc/new.rs\nM\tsrc/lib.rs\nD\told.rs\nT\tlink\nR100\ta.rs\tb.rs\n\n";
      assert_eq!(parse_name_status(listing), vec!["src/new.rs", "src/lib.rs", "link"]);
   }

   #[test]
   fn test_not_a_git_repository() {
      let tmp = TempDir::new().unwrap();
      let dir = tmp.path().to_str().unwrap();
      let err = modified_files(dir, "HEAD~1", "HEAD").unwrap_err();
      assert!(matches!(err, BotError::NotAGitRepository { .. }));
      let err = commit_subjects(dir, "HEAD~1", "HEAD").unwrap_err();
      assert!(matches!(err, BotError::NotAGitRepository { .. }));
   }

   #[test]
   fn test_modified_files_and_commit_subjects() {
      let tmp = init_repo();
      let dir = tmp.path().to_str().unwrap();

      fs::write(tmp.path().join("keep.txt"), "one\n").unwrap();
      fs::write(tmp.path().join("gone.txt"), "bye\n").unwrap();
      let base = commit_all(dir, "Initial commit");

      fs::write(tmp.path().join("keep.txt"), "two\n").unwrap();
      fs::write(tmp.path().join("added.txt"), "hi\n").unwrap();
      commit_all(dir, "Touch files");
      fs::remove_file(tmp.path().join("gone.txt")).unwrap();
      let head = commit_all(dir, "Remove stale file");

      let mut files = modified_files(dir, &base, &head).unwrap();
      files.sort();
      assert_eq!(files, vec!["added.txt", "keep.txt"]);

      let subjects = commit_subjects(dir, &base, &head).unwrap();
      assert_eq!(subjects, vec!["Touch files", "Remove stale file"]);
   }

   #[test]
   fn test_unknown_revision_is_git_error() {
      let tmp = init_repo();
      let dir = tmp.path().to_str().unwrap();
      fs::write(tmp.path().join("a.txt"), "a\n").unwrap();
      let head = commit_all(dir, "Only commit");

      let err = modified_files(dir, "0000000000000000000000000000000000000000", &head).unwrap_err();
      assert!(matches!(err, BotError::GitError(_)));
   }
}
