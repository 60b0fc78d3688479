//! Compliance signals for a pull request title.
//!
//! A title must be long enough and open with a verb; these are the mandatory
//! checks. A leading emoji is cosmetic and gets added by the rewrite step.

use std::fmt;

use crate::{
   error::Result,
   lexicon::{PosTagger, first_token_is_verb},
   normalization::{leads_with_decorative, strip_decorative},
};

/// Titles need a word count above this to pass the length check
pub const MIN_WORD_COUNT: usize = 4;

/// A failed mandatory check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deficiency {
   TooShort,
   MissingLeadingVerb,
}

impl fmt::Display for Deficiency {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::TooShort => f.write_str("title is too short"),
         Self::MissingLeadingVerb => f.write_str("title does not start with a verb"),
      }
   }
}

/// Measurements taken once per evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceSignals {
   pub word_count:        usize,
   pub starts_with_verb:  bool,
   pub starts_with_emoji: bool,
}

impl ComplianceSignals {
   pub fn measure(title: &str, tagger: &dyn PosTagger) -> Result<Self> {
      Ok(Self {
         word_count:        count_words(title),
         starts_with_verb:  first_token_is_verb(title, tagger)?,
         starts_with_emoji: leads_with_decorative(title)?,
      })
   }

   pub const fn is_long_enough(&self) -> bool {
      self.word_count > MIN_WORD_COUNT
   }

   /// Failed mandatory checks, length first; empty when both pass
   pub fn deficiencies(&self) -> Vec<Deficiency> {
      let mut reasons = Vec::new();
      if !self.is_long_enough() {
         reasons.push(Deficiency::TooShort);
      }
      if !self.starts_with_verb {
         reasons.push(Deficiency::MissingLeadingVerb);
      }
      reasons
   }
}

/// Single-space-delimited segments of the undecorated title, plus one.
///
/// The extra word is a deliberate allowance: a four-word title passes the
/// length check.
pub fn count_words(title: &str) -> usize {
   strip_decorative(title).split(' ').count() + 1
}
