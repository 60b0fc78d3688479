use std::{thread, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
   config::{BotConfig, SamplingConfig},
   error::{BotError, Result},
   normalization::strip_decorative,
   style, templates,
   tokens::TokenCounter,
};

/// One request to an OpenAI-style `/completions` endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
   pub model:             String,
   pub prompt:            String,
   /// Text that follows the completion (infix insertion)
   #[serde(skip_serializing_if = "Option::is_none")]
   pub suffix:            Option<String>,
   pub max_tokens:        u32,
   pub top_p:             f32,
   pub frequency_penalty: f32,
   pub presence_penalty:  f32,
   pub temperature:       f32,
}

impl CompletionRequest {
   pub fn new(sampling: &SamplingConfig, prompt: impl Into<String>) -> Self {
      Self {
         model:             sampling.model.clone(),
         prompt:            prompt.into(),
         suffix:            None,
         max_tokens:        sampling.max_tokens,
         top_p:             sampling.top_p,
         frequency_penalty: sampling.frequency_penalty,
         presence_penalty:  sampling.presence_penalty,
         temperature:       sampling.temperature,
      }
   }

   pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
      self.suffix = Some(suffix.into());
      self
   }

   pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
      self.max_tokens = max_tokens;
      self
   }
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
   #[serde(default)]
   text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
   choices: Vec<CompletionChoice>,
}

/// Anything that can turn a completion request into text.
///
/// Implementations return the first choice's text, trimmed.
pub trait Completer {
   fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Backoff settings for transient API failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
   pub max_retries:        u32,
   pub initial_backoff_ms: u64,
}

impl RetryPolicy {
   pub const fn from_config(config: &BotConfig) -> Self {
      Self { max_retries: config.max_retries, initial_backoff_ms: config.initial_backoff_ms }
   }

   /// Delay before retry number `attempt` (1-based), doubling each time and
   /// saturating instead of overflowing
   pub fn backoff_ms(&self, attempt: u32) -> u64 {
      let factor = 1u64
         .checked_shl(attempt.saturating_sub(1))
         .unwrap_or(u64::MAX);
      self.initial_backoff_ms.saturating_mul(factor)
   }
}

/// Transport failures are worth another attempt; API and parse errors are not
const fn is_transient(err: &BotError) -> bool {
   matches!(err, BotError::HttpError(_))
}

/// Retry an API call with exponential backoff.
///
/// The closure returns `Ok((true, _))` to request a retry (server error),
/// `Ok((false, Some(v)))` on success. Every retry is logged.
pub fn retry_api_call<F, T>(policy: &RetryPolicy, mut f: F) -> Result<T>
where
   F: FnMut() -> Result<(bool, Option<T>)>,
{
   let mut attempt = 0;

   loop {
      attempt += 1;

      match f() {
         Ok((false, Some(result))) => return Ok(result),
         Ok((false, None)) => {
            return Err(BotError::Gateway("API call failed without result".to_string()));
         },
         Ok((true, _)) if attempt < policy.max_retries => {
            let backoff_ms = policy.backoff_ms(attempt);
            style::warn(&format!("Retry {}/{} after {}ms...", attempt, policy.max_retries, backoff_ms));
            thread::sleep(Duration::from_millis(backoff_ms));
         },
         Ok((true, _)) => {
            return Err(BotError::ApiRetryExhausted {
               retries: policy.max_retries,
               source:  Box::new(BotError::Gateway("Max retries exceeded".to_string())),
            });
         },
         Err(e) if is_transient(&e) && attempt < policy.max_retries => {
            let backoff_ms = policy.backoff_ms(attempt);
            style::warn(&format!(
               "Error: {e} - Retry {}/{} after {}ms...",
               attempt, policy.max_retries, backoff_ms
            ));
            thread::sleep(Duration::from_millis(backoff_ms));
         },
         Err(e) => return Err(e),
      }
   }
}

/// Blocking HTTP client for the completions endpoint
pub struct CompletionClient {
   client:       reqwest::blocking::Client,
   api_base_url: String,
   api_key:      Option<String>,
   retry:        RetryPolicy,
}

impl CompletionClient {
   /// Build HTTP client with timeouts from config
   pub fn new(config: &BotConfig) -> Result<Self> {
      let client = reqwest::blocking::Client::builder()
         .timeout(Duration::from_secs(config.request_timeout_secs))
         .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
         .build()?;

      Ok(Self {
         client,
         api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
         api_key: config.api_key.clone(),
         retry: RetryPolicy::from_config(config),
      })
   }
}

impl Completer for CompletionClient {
   fn complete(&self, request: &CompletionRequest) -> Result<String> {
      retry_api_call(&self.retry, || {
         let mut request_builder = self
            .client
            .post(format!("{}/completions", self.api_base_url))
            .header("content-type", "application/json");

         if let Some(ref api_key) = self.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {api_key}"));
         }

         let response = request_builder.json(request).send()?;
         let status = response.status();

         // Retry on 5xx errors
         if status.is_server_error() {
            let error_text = response
               .text()
               .unwrap_or_else(|_| "Unknown error".to_string());
            style::warn(&format!("Server error {status}: {error_text}"));
            return Ok((true, None));
         }

         if !status.is_success() {
            let error_text = response
               .text()
               .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BotError::ApiError { status: status.as_u16(), body: error_text });
         }

         let body = response.text()?;
         let api_response: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            BotError::Gateway(format!(
               "Malformed completion response: {e}. Response was: {}",
               body.chars().take(200).collect::<String>()
            ))
         })?;

         let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BotError::Gateway("API returned no completion choices".to_string()))?;

         Ok((false, Some(choice.text.trim().to_string())))
      })
   }
}

/// The three model-backed operations used by the review pipeline
pub struct Gateway<'a> {
   completer: &'a dyn Completer,
   config:    &'a BotConfig,
   tokens:    TokenCounter,
}

impl<'a> Gateway<'a> {
   pub fn new(completer: &'a dyn Completer, config: &'a BotConfig) -> Self {
      Self { completer, config, tokens: TokenCounter::new(&config.comment.model) }
   }

   /// Title Case the text and fix its spelling
   pub fn title_case(&self, text: &str) -> Result<String> {
      let prompt = templates::render_title_case_prompt(self.config.prompts_dir.as_deref(), text)?;
      let request = CompletionRequest::new(&self.config.title_case, prompt);

      println!("{} Title casing with {}", style::icons::ROBOT, style::model(&request.model));
      let returned = self.completer.complete(&request)?;
      println!("{}", style::dim(&format!("Title case response: {returned:?}")));

      let cased = strip_wrapping_quotes(returned.trim());
      if cased.is_empty() {
         return Err(BotError::Gateway("title case response was empty".to_string()));
      }
      Ok(cased.to_string())
   }

   /// Put one relevant emoji in front of `text`, separated by a single space
   pub fn insert_leading_emoji(&self, text: &str) -> Result<String> {
      let prompt = templates::render_emoji_prompt(self.config.prompts_dir.as_deref())?;
      let request = CompletionRequest::new(&self.config.emoji, prompt).with_suffix(format!(" {text}"));

      println!("{} Choosing an emoji with {}", style::icons::ROBOT, style::model(&request.model));
      let returned = self.completer.complete(&request)?;
      println!("{}", style::dim(&format!("Emoji response: {returned:?}")));

      let emoji = extract_emoji(&returned, text)?;
      Ok(format!("{emoji} {text}"))
   }

   /// Write the review comment body from the accumulated prompt
   pub fn compose_comment(&self, prompt: &str, max_tokens: u32) -> Result<String> {
      let budget = self
         .tokens
         .completion_budget(prompt, max_tokens, self.config.context_window);
      if budget < max_tokens {
         style::warn(&format!(
            "Prompt leaves room for {budget} of {max_tokens} requested completion tokens"
         ));
      }

      let request = CompletionRequest::new(&self.config.comment, prompt).with_max_tokens(budget);

      println!("{} Composing comment with {}", style::icons::ROBOT, style::model(&request.model));
      let comment = self.completer.complete(&request)?;

      let comment = comment.trim();
      if comment.is_empty() {
         return Err(BotError::Gateway("comment response was empty".to_string()));
      }
      Ok(comment.to_string())
   }
}

/// Drop one pair of double quotes surrounding the whole text
fn strip_wrapping_quotes(text: &str) -> &str {
   text
      .strip_prefix('"')
      .and_then(|rest| rest.strip_suffix('"'))
      .map_or(text, str::trim)
}

/// Pull the inserted emoji out of an infix completion.
///
/// The service may return just the insertion or echo the whole string; the
/// known suffix is removed either way. What remains must open with a run of
/// decorative characters.
fn extract_emoji<'r>(returned: &'r str, text: &str) -> Result<&'r str> {
   let returned = returned.trim();
   let prefix = returned.strip_suffix(text).unwrap_or(returned).trim();

   let emoji = prefix
      .split_whitespace()
      .next()
      .ok_or_else(|| BotError::Gateway("emoji response contained no emoji".to_string()))?;

   if !strip_decorative(emoji).is_empty() {
      return Err(BotError::Gateway(format!(
         "emoji response {returned:?} does not start with an emoji"
      )));
   }

   Ok(emoji)
}

#[cfg(test)]
mod tests {
   use std::{
      io::{Read, Write},
      net::TcpListener,
   };

   use super::*;
   use crate::testing::ScriptedCompleter;

   fn config() -> BotConfig {
      BotConfig { max_retries: 2, initial_backoff_ms: 0, ..BotConfig::default() }
   }

   /// Serve a single canned HTTP response; yields the raw request text
   fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
      let listener = TcpListener::bind("127.0.0.1:0").unwrap();
      let url = format!("http://{}", listener.local_addr().unwrap());
      let handle = thread::spawn(move || {
         let (mut stream, _) = listener.accept().unwrap();
         let mut raw = Vec::new();
         let mut buf = [0u8; 4096];
         loop {
            let n = stream.read(&mut buf).unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
               let content_length = text[..header_end]
                  .lines()
                  .find_map(|l| {
                     l.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                  })
                  .unwrap_or(0);
               if raw.len() >= header_end + 4 + content_length {
                  break;
               }
            }
            if n == 0 {
               break;
            }
         }
         let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
         );
         stream.write_all(response.as_bytes()).unwrap();
         String::from_utf8_lossy(&raw).to_string()
      });
      (url, handle)
   }

   #[test]
   fn test_request_serialization() {
      let config = config();
      let request = CompletionRequest::new(&config.emoji, "Insert: ").with_suffix(" Add feature");
      let json = serde_json::to_value(&request).unwrap();
      assert_eq!(json["model"], "text-davinci-003");
      assert_eq!(json["suffix"], " Add feature");
      assert_eq!(json["max_tokens"], 300);
      assert_eq!(json["temperature"], 0.0);

      let plain = serde_json::to_value(CompletionRequest::new(&config.comment, "hi")).unwrap();
      assert!(plain.get("suffix").is_none());
   }

   #[test]
   fn test_completion_client_uses_first_choice_trimmed() {
      let (url, server) = serve_once(
         "200 OK",
         r#"{"choices":[{"text":"\n\n  Fix Bug In Parser \n"},{"text":"ignored"}]}"#,
      );
      let config = BotConfig { api_base_url: format!("{url}/v1/"), api_key: Some("sk-test".into()), ..config() };
      let client = CompletionClient::new(&config).unwrap();

      let text = client
         .complete(&CompletionRequest::new(&config.title_case, "Make this Title Case"))
         .unwrap();
      assert_eq!(text, "Fix Bug In Parser");

      let raw_request = server.join().unwrap();
      assert!(raw_request.starts_with("POST /v1/completions "));
      assert!(raw_request.contains("Bearer sk-test"));
      assert!(raw_request.contains("\"model\":\"text-curie-001\""));
   }

   #[test]
   fn test_completion_client_client_error_is_not_retried() {
      let (url, server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#);
      let config = BotConfig { api_base_url: url, ..config() };
      let client = CompletionClient::new(&config).unwrap();

      let err = client
         .complete(&CompletionRequest::new(&config.comment, "hello"))
         .unwrap_err();
      assert!(matches!(err, BotError::ApiError { status: 401, .. }));
      server.join().unwrap();
   }

   #[test]
   fn test_completion_client_empty_choices() {
      let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#);
      let config = BotConfig { api_base_url: url, ..config() };
      let client = CompletionClient::new(&config).unwrap();

      let err = client
         .complete(&CompletionRequest::new(&config.comment, "hello"))
         .unwrap_err();
      assert!(matches!(err, BotError::Gateway(_)));
      server.join().unwrap();
   }

   #[test]
   fn test_completion_client_malformed_body() {
      let (url, server) = serve_once("200 OK", r#"{"nope":true}"#);
      let config = BotConfig { api_base_url: url, ..config() };
      let client = CompletionClient::new(&config).unwrap();

      let err = client
         .complete(&CompletionRequest::new(&config.comment, "hello"))
         .unwrap_err();
      assert!(err.to_string().contains("Malformed completion response"));
      server.join().unwrap();
   }

   #[test]
   fn test_retry_api_call_retries_server_errors() {
      let policy = RetryPolicy { max_retries: 3, initial_backoff_ms: 0 };
      let mut calls = 0;
      let result = retry_api_call(&policy, || {
         calls += 1;
         if calls < 3 { Ok((true, None)) } else { Ok((false, Some("done"))) }
      });
      assert_eq!(result.unwrap(), "done");
      assert_eq!(calls, 3);
   }

   #[test]
   fn test_retry_api_call_exhausts() {
      let policy = RetryPolicy { max_retries: 2, initial_backoff_ms: 0 };
      let mut calls = 0;
      let result: Result<()> = retry_api_call(&policy, || {
         calls += 1;
         Ok((true, None))
      });
      assert!(matches!(result, Err(BotError::ApiRetryExhausted { retries: 2, .. })));
      assert_eq!(calls, 2);
   }

   #[test]
   fn test_backoff_doubles_and_saturates() {
      let policy = RetryPolicy { max_retries: 100, initial_backoff_ms: 1000 };
      assert_eq!(policy.backoff_ms(1), 1000);
      assert_eq!(policy.backoff_ms(2), 2000);
      assert_eq!(policy.backoff_ms(4), 8000);
      assert_eq!(policy.backoff_ms(64), u64::MAX);
      assert_eq!(policy.backoff_ms(99), u64::MAX);

      let huge = RetryPolicy { max_retries: 3, initial_backoff_ms: u64::MAX / 2 };
      assert_eq!(huge.backoff_ms(3), u64::MAX);
   }

   #[test]
   fn test_retry_api_call_does_not_retry_gateway_errors() {
      let policy = RetryPolicy { max_retries: 5, initial_backoff_ms: 0 };
      let mut calls = 0;
      let result: Result<()> = retry_api_call(&policy, || {
         calls += 1;
         Err(BotError::Gateway("malformed".to_string()))
      });
      assert!(result.is_err());
      assert_eq!(calls, 1);
   }

   #[test]
   fn test_title_case_request_and_quotes() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["\"Fix Bug in Parser\""]);
      let gateway = Gateway::new(&completer, &config);

      assert_eq!(gateway.title_case("fix bug in parsr").unwrap(), "Fix Bug in Parser");

      let requests = completer.requests();
      assert_eq!(requests.len(), 1);
      assert_eq!(
         requests[0].prompt,
         "Make this string Title Case and fix spelling: \"fix bug in parsr\""
      );
      assert_eq!(requests[0].model, "text-curie-001");
      assert_eq!(requests[0].top_p, 0.5);
      assert!(requests[0].suffix.is_none());
   }

   #[test]
   fn test_title_case_empty_response() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["  "]);
      let gateway = Gateway::new(&completer, &config);
      assert!(matches!(gateway.title_case("abc"), Err(BotError::Gateway(_))));
   }

   #[test]
   fn test_insert_leading_emoji_bare_insertion() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["✨"]);
      let gateway = Gateway::new(&completer, &config);

      let titled = gateway.insert_leading_emoji("Add feature").unwrap();
      assert_eq!(titled, "✨ Add feature");
      assert!(titled.ends_with(" Add feature"));

      let requests = completer.requests();
      assert_eq!(requests[0].prompt, "Insert an emoji at the start of this string: ");
      assert_eq!(requests[0].suffix.as_deref(), Some(" Add feature"));
      assert_eq!(requests[0].temperature, 0.0);
   }

   #[test]
   fn test_insert_leading_emoji_echoed_text() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["🎉 Add feature"]);
      let gateway = Gateway::new(&completer, &config);

      let titled = gateway.insert_leading_emoji("Add feature").unwrap();
      assert_eq!(titled, "🎉 Add feature");
      // exactly one emoji-bearing prefix before the original text
      let prefix = titled.strip_suffix(" Add feature").unwrap();
      assert_eq!(prefix.split_whitespace().count(), 1);
   }

   #[test]
   fn test_insert_leading_emoji_echo_without_space() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["🚀Add feature"]);
      let gateway = Gateway::new(&completer, &config);
      assert_eq!(gateway.insert_leading_emoji("Add feature").unwrap(), "🚀 Add feature");
   }

   #[test]
   fn test_insert_leading_emoji_rejects_non_emoji() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["Sure! Here you go"]);
      let gateway = Gateway::new(&completer, &config);
      assert!(matches!(gateway.insert_leading_emoji("Add feature"), Err(BotError::Gateway(_))));

      let completer = ScriptedCompleter::with_texts(["Add feature"]);
      let gateway = Gateway::new(&completer, &config);
      assert!(matches!(gateway.insert_leading_emoji("Add feature"), Err(BotError::Gateway(_))));
   }

   #[test]
   fn test_compose_comment() {
      let config = config();
      let completer = ScriptedCompleter::with_texts(["\n\nHi @octocat, great title!\n"]);
      let gateway = Gateway::new(&completer, &config);

      let comment = gateway.compose_comment("Write a comment", 500).unwrap();
      assert_eq!(comment, "Hi @octocat, great title!");

      let requests = completer.requests();
      assert_eq!(requests[0].prompt, "Write a comment");
      assert_eq!(requests[0].max_tokens, 500);
      assert_eq!(requests[0].temperature, 0.57);
   }

   #[test]
   fn test_compose_comment_clamps_budget() {
      let config = BotConfig { context_window: 100, ..config() };
      let completer = ScriptedCompleter::with_texts(["ok"]);
      let gateway = Gateway::new(&completer, &config);

      gateway.compose_comment("Write a comment", 500).unwrap();
      let max_tokens = completer.requests()[0].max_tokens;
      assert!(max_tokens < 100 && max_tokens > 50, "got {max_tokens}");
   }

   #[test]
   fn test_compose_comment_propagates_failure() {
      let config = config();
      let completer = ScriptedCompleter::new([Err(BotError::Gateway("offline".to_string()))]);
      let gateway = Gateway::new(&completer, &config);
      let err = gateway.compose_comment("Write", 500).unwrap_err();
      assert!(err.to_string().contains("offline"));
   }
}
