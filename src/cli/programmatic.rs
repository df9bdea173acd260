//! Load and watch subcommands for code-based configs.

use crate::config::locator::is_programmatic_config;
use crate::config::{ConfigLoader, LoadOptions};
use crate::error::ConfigError;
use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::{error, info};

/// Arguments for the load subcommand
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Environment passed to the config function
    #[arg(short, long, value_name = "NAME")]
    pub env: Option<String>,
}

/// Arguments for the watch subcommand
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Environment passed to the config function
    #[arg(short, long, value_name = "NAME")]
    pub env: Option<String>,
}

fn config_path(loader: &ConfigLoader, options: &LoadOptions) -> Result<PathBuf> {
    let path = loader
        .locate(options)?
        .config_path
        .ok_or_else(|| ConfigError::NotFound {
            start: options.cwd.clone(),
        })?;
    Ok(path)
}

/// Print the raw config a file evaluates to. Static files are printed as parsed.
pub async fn run_load(loader: &ConfigLoader, options: LoadOptions, args: &LoadArgs) -> Result<()> {
    let path = config_path(loader, &options)?;
    let raw = loader.read_raw(&path, args.env.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&raw)?);
    Ok(())
}

/// Print the config after every change until interrupted.
pub async fn run_watch(loader: &ConfigLoader, options: LoadOptions, args: &WatchArgs) -> Result<()> {
    let path = config_path(loader, &options)?;
    if !is_programmatic_config(&path) {
        bail!(
            "{} is not a code-based config; only cf.config.* files can be watched",
            path.display()
        );
    }

    let session = loader
        .programmatic()
        .watch(
            &path,
            args.env.as_deref(),
            |config| match serde_json::to_string_pretty(&config) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to render config: {}", e),
            },
            |err| error!("{:#}", anyhow::Error::from(err)),
        )
        .await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for interrupt")?;
    info!("Interrupted, stopping");
    session.close();
    Ok(())
}
