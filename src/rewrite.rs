//! Turns compliance signals into a verdict and the comment-generation prompt.

use crate::{
   api::Gateway,
   error::Result,
   evaluate::{ComplianceSignals, Deficiency},
   lexicon::PosTagger,
   style,
};

/// Outcome of checking a title against the style policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
   /// Length and/or leading-verb check failed; the author fixes it by hand
   MandatoryFailure { reasons: Vec<Deficiency> },
   /// Title passed the mandatory checks and a corrected version is proposed
   Rewritten { new_title: String },
   /// Nothing to change
   AlreadyCompliant,
}

/// A verdict plus the instruction for the comment generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
   pub response_prompt: String,
   pub verdict:         Verdict,
}

impl Evaluation {
   pub const fn edited(&self) -> bool {
      matches!(self.verdict, Verdict::Rewritten { .. })
   }

   pub fn edited_title(&self) -> Option<&str> {
      match &self.verdict {
         Verdict::Rewritten { new_title } => Some(new_title),
         _ => None,
      }
   }
}

/// Append-only builder for the comment-generation prompt
#[derive(Debug)]
struct ResponsePrompt(String);

impl ResponsePrompt {
   fn addressed_to(author: &str) -> Self {
      Self(format!("In a Github format, write a comment to GitHub user \"@{author}\""))
   }

   fn push(&mut self, clause: &str) {
      self.0.push_str(clause);
   }

   fn finish(self) -> String {
      self.0
   }
}

/// Evaluate `title` and, when it passes the mandatory checks, ask the model
/// for a corrected version.
///
/// Mandatory failures return without any model call. Compliant titles are
/// always title-cased (the model may still fix spelling); an emoji is only
/// requested when the title does not already open with one.
pub fn evaluate_title(
   title: &str,
   author: &str,
   tagger: &dyn PosTagger,
   gateway: &Gateway<'_>,
) -> Result<Evaluation> {
   let signals = ComplianceSignals::measure(title, tagger)?;
   println!(
      "{} words={} verb={} emoji={}",
      style::icons::ARROW,
      signals.word_count,
      signals.starts_with_verb,
      signals.starts_with_emoji
   );

   let mut prompt = ResponsePrompt::addressed_to(author);
   let reasons = signals.deficiencies();

   if !reasons.is_empty() {
      for reason in &reasons {
         match reason {
            Deficiency::TooShort => prompt.push(" that their PR message isn't long enough"),
            Deficiency::MissingLeadingVerb if signals.is_long_enough() => {
               prompt.push(" that their PR message does not start with a verb as required");
            },
            Deficiency::MissingLeadingVerb => {
               prompt.push(" and does not start with a verb as required");
            },
         }
      }
      prompt.push(".");

      let summary = reasons
         .iter()
         .map(ToString::to_string)
         .collect::<Vec<_>>()
         .join(", ");
      style::warn(&format!("Title needs attention: {summary}"));

      return Ok(Evaluation {
         response_prompt: prompt.finish(),
         verdict:         Verdict::MandatoryFailure { reasons },
      });
   }

   let mut candidate = gateway.title_case(title)?;
   if !signals.starts_with_emoji {
      candidate = gateway.insert_leading_emoji(&candidate)?;
   }

   if candidate != title || !signals.starts_with_emoji {
      prompt.push(" that we have some suggested edits to their PR.");
      println!("{} Suggested title: {}", style::icons::SUCCESS, style::bold(&candidate));
      return Ok(Evaluation {
         response_prompt: prompt.finish(),
         verdict:         Verdict::Rewritten { new_title: candidate },
      });
   }

   prompt.push(" that their PR title was perfect.");
   println!("{} {}", style::icons::SUCCESS, style::success("Title already compliant"));
   Ok(Evaluation { response_prompt: prompt.finish(), verdict: Verdict::AlreadyCompliant })
}
