//! Review driver: collects the pull request context, evaluates the title,
//! composes the comment and renders the markdown artifact.
//!
//! [`run`] never fails. Every error or panic past argument parsing becomes a
//! fault artifact that still echoes whatever context was gathered.

use std::{
   any::Any,
   panic::{self, AssertUnwindSafe},
   path::Path,
};

use anyhow::{Context, anyhow};

use crate::{
   api::{Completer, Gateway},
   config::BotConfig,
   error::{BotError, Result},
   event::PullRequestEvent,
   git,
   lexicon::{PosTagger, ensure_tagger_loaded},
   rewrite::evaluate_title,
   style,
   templates::{self, TechnicalDetails},
   types::Args,
};

/// Opening line of every fault artifact
pub const FAULT_NOTICE: &str = "_A fault occurred with the PR validation bot._";

/// Placeholder echoed for values evaluation never produced
const NONE: &str = "None";

/// Produce the comment markdown for one pull request
pub fn run(args: &Args, config: &BotConfig, completer: &dyn Completer) -> String {
   let mut details = initial_details(args);

   let load_tagger = || {
      ensure_tagger_loaded(config.lexicon_path.as_deref()).map(|tagger| tagger as &dyn PosTagger)
   };
   let outcome =
      panic::catch_unwind(AssertUnwindSafe(|| review(args, config, completer, load_tagger, &mut details)))
         .unwrap_or_else(|payload| Err(anyhow!("review panicked: {}", panic_message(payload.as_ref()))));

   let prompts_dir = config.prompts_dir.as_deref();
   let rendered = outcome.and_then(|comment| {
      templates::render_success_artifact(prompts_dir, &comment, &details)
         .context("Failed to render review artifact")
   });

   match rendered {
      Ok(artifact) => {
         println!("{} {}", style::icons::SUCCESS, style::success("Review comment ready"));
         artifact
      },
      Err(err) => render_fault(prompts_dir, &err, &details),
   }
}

/// Fault artifact for failures before a review could start (config, client)
pub fn startup_fault(args: &Args, err: &anyhow::Error) -> String {
   render_fault(None, err, &initial_details(args))
}

fn initial_details(args: &Args) -> TechnicalDetails {
   TechnicalDetails {
      title:           args.title.clone().unwrap_or_default(),
      author:          args.author.clone().unwrap_or_default(),
      edited_title:    NONE.to_string(),
      response_prompt: NONE.to_string(),
      ..TechnicalDetails::default()
   }
}

fn render_fault(prompts_dir: Option<&Path>, err: &anyhow::Error, details: &TechnicalDetails) -> String {
   style::fail(&format!("{err:#}"));
   let chain = format!("{err:?}");
   templates::render_fault_artifact(prompts_dir, &chain, details).unwrap_or_else(|render_err| {
      style::warn(&format!("Fault template failed, writing plain notice: {render_err}"));
      plain_fault(&chain, details)
   })
}

/// The guarded section: everything that can fail lives here. The tagger is
/// loaded before any input is read.
fn review<'t>(
   args: &Args,
   config: &BotConfig,
   completer: &dyn Completer,
   load_tagger: impl FnOnce() -> Result<&'t dyn PosTagger>,
   details: &mut TechnicalDetails,
) -> anyhow::Result<String> {
   let tagger = load_tagger().context("Failed to load part-of-speech tagger")?;

   let event = args
      .event_path
      .as_deref()
      .map(PullRequestEvent::load)
      .transpose()
      .context("Failed to load pull request event")?;

   if details.title.is_empty()
      && let Some(title) = event.as_ref().and_then(PullRequestEvent::title)
   {
      details.title = title.to_string();
   }
   if details.author.is_empty()
      && let Some(author) = event.as_ref().and_then(PullRequestEvent::author)
   {
      details.author = author.to_string();
   }
   if args.title.is_none() && event.as_ref().and_then(PullRequestEvent::title).is_none() {
      return Err(BotError::MissingInput("PR_TITLE").into());
   }
   if details.author.is_empty() {
      return Err(BotError::MissingInput("PR_AUTHOR").into());
   }

   if let Some(event) = &event {
      collect_changes(&args.dir, event, args.max_files, details)?;
   }

   let gateway = Gateway::new(completer, config);
   let evaluation = evaluate_title(&details.title, &details.author, tagger, &gateway)
      .with_context(|| format!("Failed to evaluate title {:?}", details.title))?;
   details.edited_title = evaluation.edited_title().unwrap_or(NONE).to_string();
   details.response_prompt.clone_from(&evaluation.response_prompt);

   let comment = gateway
      .compose_comment(&evaluation.response_prompt, args.tokens)
      .context("Failed to compose review comment")?;
   Ok(comment)
}

/// Fill commits and the capped modified-file listing from the event range
fn collect_changes(
   dir: &str,
   event: &PullRequestEvent,
   max_files: usize,
   details: &mut TechnicalDetails,
) -> anyhow::Result<()> {
   let (base, head) = (event.base_sha(), event.head_sha());

   let subjects = git::commit_subjects(dir, base, head)
      .with_context(|| format!("Failed to list commits {base}..{head}"))?;
   details.commits = subjects.join("; ");

   let mut files = git::modified_files(dir, base, head)
      .with_context(|| format!("Failed to list modified files {base}..{head}"))?;
   details.omitted_files = files.len().saturating_sub(max_files);
   files.truncate(max_files);
   details.modified_files = files;

   style::print_info(&format!(
      "{} commit(s), {} modified file(s) listed",
      subjects.len(),
      details.modified_files.len() + details.omitted_files
   ));
   Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
   payload
      .downcast_ref::<&str>()
      .map(|s| (*s).to_string())
      .or_else(|| payload.downcast_ref::<String>().cloned())
      .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Last-resort artifact when even the fault template cannot be rendered
fn plain_fault(error: &str, details: &TechnicalDetails) -> String {
   format!(
      "{FAULT_NOTICE}\n\n```\n{error}\n```\n\n- Title: '{}'\n- Author: '{}'\n- Commits: '{}'\n- Edited \
       Title: '{}'\n",
      details.title, details.author, details.commits, details.edited_title
   )
}

/// Write the artifact, creating parent directories as needed
pub fn write_artifact(path: &Path, artifact: &str) -> Result<()> {
   if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
   {
      std::fs::create_dir_all(parent)?;
   }
   std::fs::write(path, artifact)?;
   println!("{} Wrote {}", style::icons::SAVE, style::bold(&path.display().to_string()));
   Ok(())
}
