//! Locate and resolve subcommands.

use crate::config::{ConfigLoader, LoadOptions};
use anyhow::Result;
use clap::Args;

/// Arguments for the locate subcommand
#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Ignore any redirect descriptor
    #[arg(long)]
    pub no_redirect: bool,
}

/// Arguments for the resolve subcommand
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Named environment to resolve (`env.<NAME>`)
    #[arg(short, long, value_name = "NAME")]
    pub env: Option<String>,

    /// Override `legacy_env` from the config file
    #[arg(long, value_name = "BOOL")]
    pub legacy_env: Option<bool>,

    /// Dispatch namespace the worker is deployed to
    #[arg(long, value_name = "NS")]
    pub dispatch_namespace: Option<String>,

    /// Ignore any redirect descriptor
    #[arg(long)]
    pub no_redirect: bool,
}

impl ResolveArgs {
    pub fn apply(&self, options: &mut LoadOptions) {
        options.use_redirect = !self.no_redirect;
        options.args.env = self.env.clone();
        options.args.legacy_env = self.legacy_env;
        options.args.dispatch_namespace = self.dispatch_namespace.clone();
    }
}

pub fn run_locate(loader: &ConfigLoader, mut options: LoadOptions, args: &LocateArgs) -> Result<()> {
    options.use_redirect = !args.no_redirect;
    let paths = loader.locate(&options)?;
    println!("{}", serde_json::to_string_pretty(&paths)?);
    Ok(())
}

pub async fn run_resolve(
    loader: &ConfigLoader,
    mut options: LoadOptions,
    args: &ResolveArgs,
) -> Result<()> {
    args.apply(&mut options);
    let loaded = loader.load(&options).await?;
    println!("{}", serde_json::to_string_pretty(&loaded.config)?);
    Ok(())
}
