use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
   #[error("Input is empty after trimming")]
   EmptyInput,

   #[error("Part-of-speech classification failed: {0}")]
   Classification(String),

   #[error("Language model gateway failed: {0}")]
   Gateway(String),

   #[error("API request failed (HTTP {status}): {body}")]
   ApiError { status: u16, body: String },

   #[error("API call failed after {retries} retries: {source}")]
   ApiRetryExhausted {
      retries: u32,
      #[source]
      source:  Box<Self>,
   },

   #[error("Not a git repository: {path}")]
   NotAGitRepository { path: String },

   #[error("Git command failed: {0}")]
   GitError(String),

   #[error("Invalid pull request event: {0}")]
   EventError(String),

   #[error("Missing input: {0}")]
   MissingInput(&'static str),

   #[error("Template error: {0}")]
   TemplateError(String),

   #[error("Config error: {0}")]
   ConfigError(String),

   #[error("IO error: {0}")]
   IoError(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   JsonError(#[from] serde_json::Error),

   #[error("HTTP error: {0}")]
   HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;
