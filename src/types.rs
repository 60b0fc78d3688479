use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
   author,
   version,
   about = "Review a pull request title and write a markdown comment",
   long_about = None
)]
pub struct Args {
   /// Pull request title (falls back to the event payload)
   #[arg(long, env = "PR_TITLE")]
   pub title: Option<String>,

   /// Pull request author login (falls back to the event payload)
   #[arg(long, env = "PR_AUTHOR")]
   pub author: Option<String>,

   /// Modified files listed in the technical details
   #[arg(long, env = "MAX_FILES", default_value_t = 5)]
   pub max_files: usize,

   /// Completion budget for the review comment
   #[arg(long, env = "TOKENS", default_value_t = 500)]
   pub tokens: u32,

   /// GitHub `pull_request` event payload
   #[arg(long, env = "GITHUB_EVENT_PATH")]
   pub event_path: Option<PathBuf>,

   /// Where the markdown comment is written
   #[arg(long, short = 'o', default_value = "comment.md")]
   pub output: PathBuf,

   /// Path to config file (default: ~/.config/pr-title-bot/config.toml)
   #[arg(long)]
   pub config: Option<PathBuf>,

   /// Directory to run git commands in
   #[arg(long, default_value = ".")]
   pub dir: String,
}
