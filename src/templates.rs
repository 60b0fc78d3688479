use std::{path::Path, sync::LazyLock};

use parking_lot::Mutex;
use rust_embed::RustEmbed;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{BotError, Result};

/// Embedded prompts folder (compiled into binary)
#[derive(RustEmbed)]
#[folder = "prompts/"]
struct Prompts;

/// Global Tera instance for template rendering (wrapped in Mutex for mutable
/// access)
static TERA: LazyLock<Mutex<Tera>> = LazyLock::new(|| {
   let mut tera = Tera::default();
   // Markdown and plain prompts, never HTML
   tera.autoescape_on(vec![]);
   Mutex::new(tera)
});

/// Everything echoed into the collapsible technical-details block
#[derive(Debug, Clone, Default, Serialize)]
pub struct TechnicalDetails {
   pub title:           String,
   pub author:          String,
   pub commits:         String,
   /// `None` (literally) when no rewrite was proposed
   pub edited_title:    String,
   pub modified_files:  Vec<String>,
   pub omitted_files:   usize,
   /// `None` (literally) when evaluation never produced a prompt
   pub response_prompt: String,
}

/// Load template content, preferring `<prompts_dir>/<category>/<variant>.md`
fn load_template_file(prompts_dir: Option<&Path>, category: &str, variant: &str) -> Result<String> {
   if let Some(dir) = prompts_dir {
      let template_path = dir.join(category).join(format!("{variant}.md"));
      if template_path.exists() {
         return std::fs::read_to_string(&template_path).map_err(|e| {
            BotError::TemplateError(format!(
               "Failed to read template file {}: {e}",
               template_path.display()
            ))
         });
      }
   }

   let embedded_key = format!("{category}/{variant}.md");
   if let Some(bytes) = Prompts::get(&embedded_key) {
      return std::str::from_utf8(bytes.data.as_ref())
         .map(|s| s.to_string())
         .map_err(|e| {
            BotError::TemplateError(format!("Embedded template {embedded_key} is not valid UTF-8: {e}"))
         });
   }

   Err(BotError::TemplateError(format!(
      "Template '{variant}' in category '{category}' not found as user override or embedded default"
   )))
}

fn render(prompts_dir: Option<&Path>, category: &str, variant: &str, context: &Context) -> Result<String> {
   let template_content = load_template_file(prompts_dir, category, variant)?;
   let mut tera = TERA.lock();
   tera.render_str(&template_content, context).map_err(|e| {
      BotError::TemplateError(format!("Failed to render {category}/{variant} template: {e}"))
   })
}

/// Prompt asking for Title Case and spelling fixes
pub fn render_title_case_prompt(prompts_dir: Option<&Path>, text: &str) -> Result<String> {
   let mut context = Context::new();
   context.insert("text", text);
   let rendered = render(prompts_dir, "title_case", "default", &context)?;
   Ok(rendered.trim_end_matches('\n').to_string())
}

/// Prefix prompt for the infix emoji completion; the title travels as suffix
pub fn render_emoji_prompt(prompts_dir: Option<&Path>) -> Result<String> {
   let rendered = render(prompts_dir, "emoji", "default", &Context::new())?;
   Ok(rendered.trim_end_matches('\n').to_string())
}

/// Review comment followed by the technical-details block
pub fn render_success_artifact(
   prompts_dir: Option<&Path>,
   comment: &str,
   details: &TechnicalDetails,
) -> Result<String> {
   let mut context = Context::from_serialize(details)
      .map_err(|e| BotError::TemplateError(format!("Failed to build artifact context: {e}")))?;
   context.insert("comment", comment);
   render(prompts_dir, "artifact", "success", &context)
}

/// Fault notice with the error chain and the technical-details block
pub fn render_fault_artifact(
   prompts_dir: Option<&Path>,
   error: &str,
   details: &TechnicalDetails,
) -> Result<String> {
   let mut context = Context::from_serialize(details)
      .map_err(|e| BotError::TemplateError(format!("Failed to build artifact context: {e}")))?;
   context.insert("error", error);
   render(prompts_dir, "artifact", "fault", &context)
}
