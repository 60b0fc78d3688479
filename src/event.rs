//! The `pull_request` webhook payload GitHub Actions writes to
//! `GITHUB_EVENT_PATH`. Only the fields the bot reads are modelled.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BotError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
   pub pull_request: PullRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
   #[serde(default)]
   pub title: Option<String>,
   #[serde(default)]
   pub user:  Option<User>,
   pub base:  GitRef,
   pub head:  GitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
   pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
   pub sha: String,
}

impl PullRequestEvent {
   pub fn load(path: &Path) -> Result<Self> {
      let content = std::fs::read_to_string(path).map_err(|e| {
         BotError::EventError(format!("Failed to read event file {}: {e}", path.display()))
      })?;
      Self::from_json(&content)
   }

   pub fn from_json(content: &str) -> Result<Self> {
      serde_json::from_str(content)
         .map_err(|e| BotError::EventError(format!("Not a pull_request event payload: {e}")))
   }

   pub fn base_sha(&self) -> &str {
      &self.pull_request.base.sha
   }

   pub fn head_sha(&self) -> &str {
      &self.pull_request.head.sha
   }

   pub fn title(&self) -> Option<&str> {
      self.pull_request.title.as_deref()
   }

   pub fn author(&self) -> Option<&str> {
      self.pull_request.user.as_ref().map(|u| u.login.as_str())
   }
}
