//! Test doubles for the completion service.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
   api::{Completer, CompletionRequest},
   error::{BotError, Result},
};

/// Replays canned completions in order and records every request it sees.
///
/// Once the script runs out, further calls fail with a gateway error.
pub struct ScriptedCompleter {
   responses: Mutex<VecDeque<Result<String>>>,
   requests:  Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompleter {
   pub fn new(responses: impl IntoIterator<Item = Result<String>>) -> Self {
      Self {
         responses: Mutex::new(responses.into_iter().collect()),
         requests:  Mutex::new(Vec::new()),
      }
   }

   pub fn empty() -> Self {
      Self::new(Vec::new())
   }

   pub fn with_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
      Self::new(texts.into_iter().map(|t| Ok(t.to_string())))
   }

   /// Requests received so far, oldest first
   pub fn requests(&self) -> Vec<CompletionRequest> {
      self.requests.lock().clone()
   }
}

impl Completer for ScriptedCompleter {
   fn complete(&self, request: &CompletionRequest) -> Result<String> {
      self.requests.lock().push(request.clone());
      self
         .responses
         .lock()
         .pop_front()
         .unwrap_or_else(|| Err(BotError::Gateway("scripted completer has no responses left".to_string())))
   }
}
