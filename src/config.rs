use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BotError, Result};

/// Sampling parameters for one kind of completion request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
   pub model:             String,
   pub max_tokens:        u32,
   pub top_p:             f32,
   pub frequency_penalty: f32,
   pub presence_penalty:  f32,
   pub temperature:       f32,
}

impl SamplingConfig {
   /// Low temperature, nucleus-limited: favors faithful casing/spelling fixes
   pub fn title_case() -> Self {
      Self {
         model:             "text-curie-001".to_string(),
         max_tokens:        500,
         top_p:             0.5,
         frequency_penalty: 0.2,
         presence_penalty:  1.0,
         temperature:       0.24,
      }
   }

   /// Fully deterministic infix completion for the emoji prefix
   pub fn emoji() -> Self {
      Self {
         model:             "text-davinci-003".to_string(),
         max_tokens:        300,
         top_p:             1.0,
         frequency_penalty: 0.0,
         presence_penalty:  0.0,
         temperature:       0.0,
      }
   }

   /// Warmer sampling for natural-sounding review comments
   pub fn comment() -> Self {
      Self {
         model:             "text-davinci-003".to_string(),
         max_tokens:        500,
         top_p:             1.0,
         frequency_penalty: 0.0,
         presence_penalty:  0.0,
         temperature:       0.57,
      }
   }
}

impl Default for SamplingConfig {
   fn default() -> Self {
      Self::comment()
   }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
   pub api_base_url: String,

   /// Optional API key (overridden by `PRBOT_API_KEY` or `OPENAI_API_KEY`)
   pub api_key: Option<String>,

   /// HTTP request timeout in seconds
   pub request_timeout_secs: u64,

   /// HTTP connection timeout in seconds
   pub connect_timeout_secs: u64,

   pub max_retries:        u32,
   pub initial_backoff_ms: u64,

   /// Prompt plus completion must fit in this many tokens
   pub context_window: usize,

   #[serde(default = "SamplingConfig::title_case")]
   pub title_case: SamplingConfig,
   #[serde(default = "SamplingConfig::emoji")]
   pub emoji:      SamplingConfig,
   #[serde(default = "SamplingConfig::comment")]
   pub comment:    SamplingConfig,

   /// Replacement part-of-speech lexicon (`word<TAB>TAG` lines)
   pub lexicon_path: Option<PathBuf>,

   /// Directory whose `<category>/<variant>.md` files override embedded prompts
   pub prompts_dir: Option<PathBuf>,
}

impl Default for BotConfig {
   fn default() -> Self {
      Self {
         api_base_url:         "https://api.openai.com/v1".to_string(),
         api_key:              None,
         request_timeout_secs: 120,
         connect_timeout_secs: 30,
         max_retries:          3,
         initial_backoff_ms:   1000,
         context_window:       4097,
         title_case:           SamplingConfig::title_case(),
         emoji:                SamplingConfig::emoji(),
         comment:              SamplingConfig::comment(),
         lexicon_path:         None,
         prompts_dir:          None,
      }
   }
}

impl BotConfig {
   /// Load config from `PRBOT_CONFIG` or the default location
   /// (~/.config/pr-title-bot/config.toml). Falls back to defaults when no file
   /// exists. Environment variables override file values:
   /// - `PRBOT_API_URL` overrides `api_base_url`
   /// - `PRBOT_API_KEY` (or `OPENAI_API_KEY`) overrides `api_key`
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("PRBOT_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_default()
      };

      if config_path.exists() {
         return Self::from_file(&config_path);
      }

      let mut config = Self::default();
      config.apply_env_overrides();
      Ok(config)
   }

   /// Load config from specific file
   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path)
         .map_err(|e| BotError::ConfigError(format!("Failed to read {}: {e}", path.display())))?;
      let mut config = Self::from_toml(&contents)?;
      config.apply_env_overrides();
      Ok(config)
   }

   /// Parse config from TOML text without consulting the environment
   pub fn from_toml(contents: &str) -> Result<Self> {
      toml::from_str(contents)
         .map_err(|e| BotError::ConfigError(format!("Failed to parse config: {e}")))
   }

   fn apply_env_overrides(&mut self) {
      if let Ok(api_url) = std::env::var("PRBOT_API_URL") {
         self.api_base_url = api_url;
      }

      if let Ok(api_key) = std::env::var("PRBOT_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
      {
         self.api_key = Some(api_key);
      }
   }

   /// Get default config path (platform-safe)
   /// Tries HOME (Unix/Linux/macOS) then USERPROFILE (Windows)
   pub fn default_config_path() -> Result<PathBuf> {
      std::env::var("HOME")
         .or_else(|_| std::env::var("USERPROFILE"))
         .map(|home| PathBuf::from(home).join(".config/pr-title-bot/config.toml"))
         .map_err(|_| {
            BotError::ConfigError("No home directory found (tried HOME and USERPROFILE)".to_string())
         })
   }
}
