//! Decorative-character handling for pull request titles.
//!
//! "Decorative" covers emoji, pictographs, dingbats, regional indicators and
//! the joiner/selector code points that glue emoji sequences together. Titles
//! are analyzed with these removed, and the leading-emoji policy checks whether
//! the first visible character is one of them.

use crate::error::{BotError, Result};

/// Inclusive code point ranges treated as decorative. Overlaps are harmless.
const DECORATIVE_RANGES: &[(u32, u32)] = &[
   (0x1F600, 0x1F64F), // emoticons
   (0x1F300, 0x1F5FF), // symbols & pictographs
   (0x1F680, 0x1F6FF), // transport & map symbols
   (0x1F1E0, 0x1F1FF), // regional indicators (flags)
   (0x2500, 0x2BEF),   // box drawing through misc symbols and arrows
   (0x2702, 0x27B0),   // dingbats
   (0x24C2, 0x1F251),  // enclosed characters and everything up to enclosed ideographic supplement
   (0x1F926, 0x1F937), // supplemental gestures
   (0x10000, 0x10FFFF),
   (0x2640, 0x2642),
   (0x2600, 0x2B55),
   (0x200D, 0x200D), // zero-width joiner
   (0x23CF, 0x23CF),
   (0x23E9, 0x23E9),
   (0x231A, 0x231A),
   (0xFE0F, 0xFE0F), // variation selector-16
   (0x3030, 0x3030),
];

/// Check whether a single character belongs to the decorative set
pub fn is_decorative(c: char) -> bool {
   let cp = c as u32;
   DECORATIVE_RANGES
      .iter()
      .any(|&(lo, hi)| (lo..=hi).contains(&cp))
}

/// Remove every decorative character, then trim surrounding whitespace
pub fn strip_decorative(text: &str) -> String {
   text
      .chars()
      .filter(|&c| !is_decorative(c))
      .collect::<String>()
      .trim()
      .to_string()
}

/// True if the first character of the trimmed text is decorative.
///
/// Fails with [`BotError::EmptyInput`] when nothing is left after trimming.
pub fn leads_with_decorative(text: &str) -> Result<bool> {
   let first = text.trim().chars().next().ok_or(BotError::EmptyInput)?;
   let mut buf = [0u8; 4];
   let original = first.encode_utf8(&mut buf);
   Ok(strip_decorative(original) != *original)
}
