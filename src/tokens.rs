//! Token counting for completion budgets.
//!
//! Uses tiktoken when the model is known to it, otherwise estimates
//! 4 chars ≈ 1 token.

use std::fmt;

use tiktoken_rs::{CoreBPE, get_bpe_from_model};

/// Token counter with a character-estimate fallback.
pub struct TokenCounter {
   model:    String,
   tiktoken: Option<CoreBPE>,
}

impl fmt::Debug for TokenCounter {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TokenCounter")
         .field("model", &self.model)
         .field("has_tiktoken", &self.tiktoken.is_some())
         .finish_non_exhaustive()
   }
}

impl TokenCounter {
   pub fn new(model: &str) -> Self {
      Self { model: model.to_string(), tiktoken: get_bpe_from_model(model).ok() }
   }

   /// Count tokens for a text string.
   pub fn count(&self, text: &str) -> usize {
      if let Some(ref encoder) = self.tiktoken {
         encoder.encode_with_special_tokens(text).len()
      } else {
         text.len().div_ceil(4)
      }
   }

   /// Largest completion budget that keeps prompt + completion inside
   /// `context_window`, never above `requested` and never below 1.
   pub fn completion_budget(&self, prompt: &str, requested: u32, context_window: usize) -> u32 {
      let available = context_window.saturating_sub(self.count(prompt)).max(1);
      requested.min(u32::try_from(available).unwrap_or(u32::MAX))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_fallback_estimate() {
      let counter = TokenCounter::new("definitely-not-a-model");
      assert!(counter.tiktoken.is_none());
      assert_eq!(counter.count(""), 0);
      assert_eq!(counter.count("abcd"), 1);
      assert_eq!(counter.count("abcde"), 2);
   }

   #[test]
   fn test_completion_budget_keeps_request_when_it_fits() {
      let counter = TokenCounter::new("definitely-not-a-model");
      assert_eq!(counter.completion_budget("short prompt", 500, 4097), 500);
   }

   #[test]
   fn test_completion_budget_clamps_to_window() {
      let counter = TokenCounter::new("definitely-not-a-model");
      let prompt = "x".repeat(400); // 100 tokens by estimate
      assert_eq!(counter.completion_budget(&prompt, 500, 300), 200);
      assert_eq!(counter.completion_budget(&prompt, 500, 50), 1);
   }

   #[test]
   fn test_known_model_uses_tiktoken() {
      let counter = TokenCounter::new("text-davinci-003");
      assert!(counter.tiktoken.is_some());
      assert!(counter.count("Fix bug in parser") > 0);
   }
}
