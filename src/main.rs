use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use pr_title_bot::{
   api::CompletionClient,
   config::BotConfig,
   error::Result,
   pipeline, style,
   types::Args,
};

/// Load config from args or default
fn load_config_from_args(args: &Args) -> Result<BotConfig> {
   if let Some(ref config_path) = args.config {
      BotConfig::from_file(config_path)
   } else {
      BotConfig::load()
   }
}

/// Review the pull request; config and client failures become a fault artifact
fn build_artifact(args: &Args) -> String {
   let prepared = load_config_from_args(args)
      .context("Failed to load configuration")
      .and_then(|config| {
         let client = CompletionClient::new(&config).context("Failed to build HTTP client")?;
         Ok((config, client))
      });

   match prepared {
      Ok((config, client)) => {
         println!(
            "{} Reviewing pull request title via {}",
            style::icons::INFO,
            style::info(&config.api_base_url)
         );
         pipeline::run(args, &config, &client)
      },
      Err(err) => pipeline::startup_fault(args, &err),
   }
}

fn main() -> ExitCode {
   // .env feeds the clap env fallbacks, so it must load before parsing
   dotenvy::dotenv().ok();
   let args = Args::parse();
   println!("{}", style::section_header("Pull Request Title Review", 60));

   let artifact = build_artifact(&args);

   match pipeline::write_artifact(&args.output, &artifact) {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
         style::fail(&format!("Failed to write {}: {e}", args.output.display()));
         ExitCode::FAILURE
      },
   }
}
