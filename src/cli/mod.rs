//! CLI command definitions for wrangler-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod patch;
pub mod programmatic;
pub mod resolve;

use crate::config::LoadOptions;
use crate::logging::LogSink;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patch::PatchArgs;
use programmatic::{LoadArgs, WatchArgs};
use resolve::{LocateArgs, ResolveArgs};
use std::path::PathBuf;

/// Locate, resolve and edit Workers configuration files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of searching for one
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to search from (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogSink,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print which config file would be used, as JSON
    Locate(LocateArgs),

    /// Print the config resolved for an environment, as JSON
    Resolve(ResolveArgs),

    /// Apply a partial config to the config file
    Patch(PatchArgs),

    /// Evaluate a code-based config and print the result
    Load(LoadArgs),

    /// Re-evaluate a code-based config on every change
    Watch(WatchArgs),
}

impl Cli {
    /// The search directory, made absolute.
    pub fn cwd(&self) -> Result<PathBuf> {
        let current = std::env::current_dir().context("Failed to read the current directory")?;
        Ok(match &self.cwd {
            Some(dir) => current.join(dir),
            None => current,
        })
    }

    /// Load options shared by every subcommand.
    pub fn load_options(&self) -> Result<LoadOptions> {
        let mut options = LoadOptions::new(self.cwd()?);
        options.config = self.config.clone();
        Ok(options)
    }
}
