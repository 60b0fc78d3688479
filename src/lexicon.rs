//! Part-of-speech classification for the opening word of a title.
//!
//! Titles are tokenized Treebank-style and tagged with a lexicon-backed
//! tagger. The lexicon ships inside the binary (`lexicon/en.tsv`) and can be
//! replaced with a file of the same `word<TAB>TAG[,TAG...]` format, where a
//! two-word entry declares a noun compound.

use std::{
   collections::HashMap,
   fmt,
   path::Path,
   str::FromStr,
   sync::OnceLock,
};

use rust_embed::RustEmbed;

use crate::{
   error::{BotError, Result},
   normalization::strip_decorative,
   style,
};

#[derive(RustEmbed)]
#[folder = "lexicon/"]
struct LexiconData;

const EMBEDDED_LEXICON: &str = "en.tsv";

/// Process-wide tagger, loaded once by [`ensure_tagger_loaded`]
static TAGGER: OnceLock<LexiconTagger> = OnceLock::new();

/// Penn Treebank part-of-speech tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosTag {
   CC,
   CD,
   DT,
   EX,
   FW,
   IN,
   JJ,
   JJR,
   JJS,
   LS,
   MD,
   NN,
   NNS,
   NNP,
   NNPS,
   PDT,
   POS,
   PRP,
   PRPS,
   RB,
   RBR,
   RBS,
   RP,
   SYM,
   TO,
   UH,
   VB,
   VBD,
   VBG,
   VBN,
   VBP,
   VBZ,
   WDT,
   WP,
   WPS,
   WRB,
   /// Any punctuation token (`.`, `,`, `:`, brackets, quotes)
   Punct,
}

impl PosTag {
   /// Base form, past tense, gerund, past participle, and both present forms
   pub const fn is_verb(self) -> bool {
      matches!(self, Self::VB | Self::VBD | Self::VBG | Self::VBN | Self::VBP | Self::VBZ)
   }

   pub const fn as_str(self) -> &'static str {
      match self {
         Self::CC => "CC",
         Self::CD => "CD",
         Self::DT => "DT",
         Self::EX => "EX",
         Self::FW => "FW",
         Self::IN => "IN",
         Self::JJ => "JJ",
         Self::JJR => "JJR",
         Self::JJS => "JJS",
         Self::LS => "LS",
         Self::MD => "MD",
         Self::NN => "NN",
         Self::NNS => "NNS",
         Self::NNP => "NNP",
         Self::NNPS => "NNPS",
         Self::PDT => "PDT",
         Self::POS => "POS",
         Self::PRP => "PRP",
         Self::PRPS => "PRP$",
         Self::RB => "RB",
         Self::RBR => "RBR",
         Self::RBS => "RBS",
         Self::RP => "RP",
         Self::SYM => "SYM",
         Self::TO => "TO",
         Self::UH => "UH",
         Self::VB => "VB",
         Self::VBD => "VBD",
         Self::VBG => "VBG",
         Self::VBN => "VBN",
         Self::VBP => "VBP",
         Self::VBZ => "VBZ",
         Self::WDT => "WDT",
         Self::WP => "WP",
         Self::WPS => "WP$",
         Self::WRB => "WRB",
         Self::Punct => ".",
      }
   }
}

impl fmt::Display for PosTag {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

impl FromStr for PosTag {
   type Err = String;

   fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
      let tag = match s {
         "CC" => Self::CC,
         "CD" => Self::CD,
         "DT" => Self::DT,
         "EX" => Self::EX,
         "FW" => Self::FW,
         "IN" => Self::IN,
         "JJ" => Self::JJ,
         "JJR" => Self::JJR,
         "JJS" => Self::JJS,
         "LS" => Self::LS,
         "MD" => Self::MD,
         "NN" => Self::NN,
         "NNS" => Self::NNS,
         "NNP" => Self::NNP,
         "NNPS" => Self::NNPS,
         "PDT" => Self::PDT,
         "POS" => Self::POS,
         "PRP" => Self::PRP,
         "PRP$" => Self::PRPS,
         "RB" => Self::RB,
         "RBR" => Self::RBR,
         "RBS" => Self::RBS,
         "RP" => Self::RP,
         "SYM" => Self::SYM,
         "TO" => Self::TO,
         "UH" => Self::UH,
         "VB" => Self::VB,
         "VBD" => Self::VBD,
         "VBG" => Self::VBG,
         "VBN" => Self::VBN,
         "VBP" => Self::VBP,
         "VBZ" => Self::VBZ,
         "WDT" => Self::WDT,
         "WP" => Self::WP,
         "WP$" => Self::WPS,
         "WRB" => Self::WRB,
         "." | "," | ":" | "(" | ")" | "``" | "''" | "#" | "$" => Self::Punct,
         other => return Err(format!("unknown part-of-speech tag '{other}'")),
      };
      Ok(tag)
   }
}

/// Tags a token sequence, one tag per token
pub trait PosTagger {
   fn tag(&self, tokens: &[String]) -> Result<Vec<PosTag>>;
}

/// Characters that always form a token of their own
const SPLIT_CHARS: &[char] =
   &['(', ')', '[', ']', '{', '}', '<', '>', '"', '`', ',', ';', '!', '?'];

/// Clitics split off the end of a word (longest first)
const CONTRACTIONS: &[&str] = &["n't", "'ll", "'re", "'ve", "'s", "'d", "'m"];

/// Split text into word and punctuation tokens.
///
/// Brackets, quotes, commas and similar always stand alone. Periods and colons
/// are split only at the end of a word, so versions (`1.0.2`) and URLs stay
/// whole. English contractions are split the Treebank way (`don't` → `do`,
/// `n't`).
pub fn tokenize(text: &str) -> Vec<String> {
   let mut tokens = Vec::new();

   for chunk in text.split_whitespace() {
      let mut current = String::new();
      for c in chunk.chars() {
         if SPLIT_CHARS.contains(&c) {
            push_word(&mut tokens, std::mem::take(&mut current));
            tokens.push(c.to_string());
         } else {
            current.push(c);
         }
      }
      push_word(&mut tokens, current);
   }

   tokens
}

fn push_word(tokens: &mut Vec<String>, word: String) {
   let mut word = word.as_str();

   while let Some(rest) = word.strip_prefix('\'') {
      tokens.push("'".to_string());
      word = rest;
   }

   let mut trailing = Vec::new();
   while let Some(last) = word.chars().last()
      && matches!(last, '.' | ':' | '\'')
   {
      trailing.push(last.to_string());
      word = &word[..word.len() - last.len_utf8()];
   }

   if !word.is_empty() {
      let lower = word.to_lowercase();
      let clitic = CONTRACTIONS
         .iter()
         .find(|c| lower.ends_with(*c) && lower.len() > c.len());
      if let Some(clitic) = clitic {
         let split_at = word.len() - clitic.len();
         tokens.push(word[..split_at].to_string());
         tokens.push(word[split_at..].to_string());
      } else {
         tokens.push(word.to_string());
      }
   }

   tokens.extend(trailing.into_iter().rev());
}

/// Lexicon-backed tagger with morphological fallbacks for unknown words
#[derive(Debug, Clone)]
pub struct LexiconTagger {
   entries:   HashMap<String, Vec<PosTag>>,
   /// Two-word noun compounds keyed `"modifier head"`; tags describe the head
   compounds: HashMap<String, Vec<PosTag>>,
}

impl LexiconTagger {
   /// Parse `word<TAB>TAG[,TAG...]` lines; `#` starts a comment line.
   ///
   /// A word made of two space-separated parts (`release notes`) is a noun
   /// compound: its first part is always tagged as a modifier noun.
   pub fn parse(source: &str) -> Result<Self> {
      let mut entries: HashMap<String, Vec<PosTag>> = HashMap::new();
      let mut compounds: HashMap<String, Vec<PosTag>> = HashMap::new();

      for (idx, line) in source.lines().enumerate() {
         let line = line.trim();
         if line.is_empty() || line.starts_with('#') {
            continue;
         }

         let (word, tags) = line.split_once('\t').ok_or_else(|| {
            BotError::Classification(format!("lexicon line {} has no tab separator", idx + 1))
         })?;

         let parts: Vec<String> = word.split_whitespace().map(str::to_lowercase).collect();
         let slot = match parts.as_slice() {
            [single] => entries.entry(single.clone()).or_default(),
            [modifier, head] => compounds.entry(format!("{modifier} {head}")).or_default(),
            _ => {
               return Err(BotError::Classification(format!(
                  "lexicon line {}: expected one word or a two-word compound",
                  idx + 1
               )));
            },
         };

         for tag in tags.split(',') {
            let tag = tag
               .trim()
               .parse::<PosTag>()
               .map_err(|e| BotError::Classification(format!("lexicon line {}: {e}", idx + 1)))?;
            if !slot.contains(&tag) {
               slot.push(tag);
            }
         }
      }

      if entries.is_empty() {
         return Err(BotError::Classification("lexicon contains no entries".to_string()));
      }

      Ok(Self { entries, compounds })
   }

   /// Load the lexicon bundled with the binary
   pub fn embedded() -> Result<Self> {
      let file = LexiconData::get(EMBEDDED_LEXICON).ok_or_else(|| {
         BotError::Classification(format!("embedded lexicon '{EMBEDDED_LEXICON}' is missing"))
      })?;
      let source = std::str::from_utf8(file.data.as_ref()).map_err(|e| {
         BotError::Classification(format!("embedded lexicon is not valid UTF-8: {e}"))
      })?;
      Self::parse(source)
   }

   /// Load a lexicon from disk
   pub fn from_file(path: &Path) -> Result<Self> {
      let source = std::fs::read_to_string(path).map_err(|e| {
         BotError::Classification(format!("failed to read lexicon {}: {e}", path.display()))
      })?;
      Self::parse(&source)
   }

   /// Single words plus compounds
   pub fn len(&self) -> usize {
      self.entries.len() + self.compounds.len()
   }

   pub fn is_empty(&self) -> bool {
      self.entries.is_empty() && self.compounds.is_empty()
   }

   /// Head tag of a compound starting at `position`, if one does
   fn compound_at(&self, lowered: &[String], position: usize) -> Option<PosTag> {
      let head = lowered.get(position + 1)?;
      self
         .compounds
         .get(&format!("{} {head}", lowered[position]))
         .and_then(|tags| tags.first().copied())
   }

   fn tag_token(&self, token: &str, lower: &str, previous: Option<PosTag>) -> PosTag {
      if let Some(tag) = closed_class(token) {
         return tag;
      }
      match self.entries.get(lower) {
         Some(tags) => Self::disambiguate(tags, previous),
         None => guess_unknown(token, lower),
      }
   }

   /// Pick a reading for an ambiguous lexicon entry from its left context
   fn disambiguate(tags: &[PosTag], previous: Option<PosTag>) -> PosTag {
      let base_verb = tags.iter().copied().find(|&t| t == PosTag::VB);
      let noun = tags
         .iter()
         .copied()
         .find(|t| matches!(t, PosTag::NN | PosTag::NNS));

      match previous {
         Some(PosTag::TO | PosTag::MD) => base_verb.unwrap_or(tags[0]),
         Some(PosTag::DT | PosTag::JJ | PosTag::PRPS | PosTag::POS | PosTag::CD) => {
            noun.unwrap_or(tags[0])
         },
         _ => tags[0],
      }
   }

   /// Tag the opening word.
   ///
   /// Titles are imperative, so an opener with a verb reading takes it unless
   /// the next token shows the opener is a subject or a label: a `:` right
   /// after it (`Docs: ...`) or a word that can only be a finite verb
   /// (`Build fails ...`).
   fn tag_opener(&self, token: &str, lower: &str, next: Option<&str>) -> PosTag {
      if let Some(tag) = closed_class(token) {
         return tag;
      }

      let readings = self
         .entries
         .get(lower)
         .cloned()
         .unwrap_or_else(|| guess_unknown_opener(token, lower));
      let verb = readings.iter().copied().find(|t| t.is_verb());
      let noun = readings
         .iter()
         .copied()
         .find(|t| matches!(t, PosTag::NN | PosTag::NNS | PosTag::NNP | PosTag::NNPS));

      match (verb, noun) {
         (Some(_), Some(noun)) if self.marks_nominal_opener(next) => noun,
         (Some(verb), _) => verb,
         (None, _) => readings[0],
      }
   }

   fn marks_nominal_opener(&self, next: Option<&str>) -> bool {
      let Some(next) = next else {
         return false;
      };
      if next == ":" {
         return true;
      }
      self.entries.get(next).is_some_and(|tags| {
         tags
            .iter()
            .all(|t| matches!(t, PosTag::VBZ | PosTag::VBD | PosTag::VBP | PosTag::MD))
      })
   }
}

/// Punctuation and numbers, which need no lexicon
fn closed_class(token: &str) -> Option<PosTag> {
   if token.chars().all(|c| !c.is_alphanumeric()) {
      return Some(PosTag::Punct);
   }
   if token
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
   {
      return Some(PosTag::CD);
   }
   None
}

const ED_BLOCKLIST: &[&str] = &["bed", "red", "shed", "hundred", "speed", "seed", "feed"];

/// Suffix rules for words the lexicon does not know
fn guess_unknown(token: &str, lower: &str) -> PosTag {
   if lower.len() > 4 && lower.ends_with("ing") {
      return PosTag::VBG;
   }
   if lower.len() > 3 && lower.ends_with("ed") && !ED_BLOCKLIST.contains(&lower) {
      return PosTag::VBD;
   }
   if lower.ends_with("ly") && lower.len() > 3 {
      return PosTag::RB;
   }
   if token.chars().next().is_some_and(char::is_uppercase) {
      return PosTag::NNP;
   }
   if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") {
      return PosTag::NNS;
   }
   PosTag::NN
}

/// Candidate readings for an unknown opening word, most likely first.
///
/// Capitalization says nothing here since every title starts with a capital;
/// only an all-caps acronym (`CI`, `API`) is read as a proper noun.
fn guess_unknown_opener(token: &str, lower: &str) -> Vec<PosTag> {
   if lower.len() > 4 && lower.ends_with("ing") {
      return vec![PosTag::VBG, PosTag::NN];
   }
   if lower.len() > 3 && lower.ends_with("ed") && !ED_BLOCKLIST.contains(&lower) {
      return vec![PosTag::VBD, PosTag::VBN];
   }
   if lower.ends_with("ly") && lower.len() > 3 {
      return vec![PosTag::RB];
   }
   if token.chars().count() > 1 && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
      return vec![PosTag::NNP];
   }
   if lower.len() > 3 && lower.ends_with('s') && !["ss", "us", "is"].iter().any(|e| lower.ends_with(e)) {
      return vec![PosTag::VBZ, PosTag::NNS];
   }
   vec![PosTag::VB, PosTag::NN]
}

impl PosTagger for LexiconTagger {
   fn tag(&self, tokens: &[String]) -> Result<Vec<PosTag>> {
      let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
      let mut tags = Vec::with_capacity(tokens.len());
      let mut position = 0;

      while position < tokens.len() {
         if let Some(head) = self.compound_at(&lowered, position) {
            tags.push(PosTag::NN);
            tags.push(head);
            position += 2;
            continue;
         }

         let tag = if position == 0 {
            self.tag_opener(&tokens[0], &lowered[0], lowered.get(1).map(String::as_str))
         } else {
            self.tag_token(&tokens[position], &lowered[position], tags.last().copied())
         };
         tags.push(tag);
         position += 1;
      }

      Ok(tags)
   }
}

/// Load the tagger once per process and hand out the cached instance.
///
/// `lexicon_path` only matters on the first call; later calls return whatever
/// was loaded first.
pub fn ensure_tagger_loaded(lexicon_path: Option<&Path>) -> Result<&'static LexiconTagger> {
   if let Some(tagger) = TAGGER.get() {
      return Ok(tagger);
   }

   let tagger = match lexicon_path {
      Some(path) => LexiconTagger::from_file(path)?,
      None => LexiconTagger::embedded()?,
   };
   style::print_info(&format!("Loaded part-of-speech lexicon ({} entries)", tagger.len()));

   Ok(TAGGER.get_or_init(|| tagger))
}

/// Whether the first token of `text` (decorations removed) is tagged as a verb
pub fn first_token_is_verb(text: &str, tagger: &dyn PosTagger) -> Result<bool> {
   let cleaned = strip_decorative(text);
   let tokens = tokenize(&cleaned);
   if tokens.is_empty() {
      return Err(BotError::Classification(format!("no tokens in {text:?}")));
   }

   let tags = tagger.tag(&tokens)?;
   let first = tags
      .first()
      .copied()
      .ok_or_else(|| BotError::Classification("tagger returned no tags".to_string()))?;

   println!("{}", style::dim(&format!("First token '{}' tagged {first}", tokens[0])));
   Ok(first.is_verb())
}
