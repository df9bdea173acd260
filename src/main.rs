//! wrangler-config
//!
//! Locates, resolves, loads and patches Workers configuration files.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::debug;
use wrangler_config::cli::patch::run_patch;
use wrangler_config::cli::programmatic::{run_load, run_watch};
use wrangler_config::cli::resolve::{run_locate, run_resolve};
use wrangler_config::cli::{Cli, Command};
use wrangler_config::config::{ConfigLoader, Settings};
use wrangler_config::logging::init_logging;
use wrangler_config::vars::ProcessEnv;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, cli.verbose, &ProcessEnv)?;

    let settings = Settings::from_env(&ProcessEnv);
    debug!(?settings, "starting");
    let loader = ConfigLoader::new(settings, Arc::new(ProcessEnv));
    let options = cli.load_options()?;

    match &cli.command {
        Command::Locate(args) => run_locate(&loader, options, args),
        Command::Resolve(args) => run_resolve(&loader, options, args).await,
        Command::Patch(args) => run_patch(&loader, options, args),
        Command::Load(args) => run_load(&loader, options, args).await,
        Command::Watch(args) => run_watch(&loader, options, args).await,
    }
}
