//! Pull request title reviewer
//!
//! Checks a title against the house style (long enough, opens with a verb,
//! leads with an emoji), asks an OpenAI-style completion service for a
//! corrected title and a review comment, and renders the result as markdown.
pub mod api;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod event;
pub mod git;
pub mod lexicon;
pub mod normalization;
pub mod pipeline;
pub mod rewrite;
pub mod style;
pub mod templates;
pub mod tokens;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{Completer, CompletionClient, CompletionRequest, Gateway};
pub use config::BotConfig;
pub use error::{BotError, Result};
pub use rewrite::{Evaluation, Verdict, evaluate_title};
pub use types::Args;
