//! Patch subcommand.

use crate::config::{ConfigLoader, LoadOptions};
use crate::error::ConfigError;
use crate::patch::{EditMode, PatchNode, patch_config_file};
use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the patch subcommand
#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Partial config as a JSON object
    #[arg(value_name = "PATCH_JSON")]
    pub patch: String,

    /// How arrays are applied: additive (append) or replacing (by index)
    #[arg(short, long, default_value = "additive", value_name = "MODE")]
    pub mode: EditMode,

    /// Write the result back instead of printing it
    #[arg(short, long)]
    pub write: bool,
}

impl PatchArgs {
    pub fn parse_patch(&self) -> Result<PatchNode> {
        let value: Value =
            serde_json::from_str(&self.patch).context("The patch must be a JSON object")?;
        if !value.is_object() {
            anyhow::bail!("The patch must be a JSON object, got {}", value);
        }
        Ok(PatchNode::from(value))
    }
}

/// Patches the user's own config file; redirect descriptors are not followed.
pub fn run_patch(loader: &ConfigLoader, mut options: LoadOptions, args: &PatchArgs) -> Result<()> {
    options.use_redirect = false;
    let patch = args.parse_patch()?;
    let path: PathBuf = loader
        .locate(&options)?
        .user_config_path
        .ok_or_else(|| ConfigError::NotFound {
            start: options.cwd.clone(),
        })?;

    let patched = patch_config_file(&path, &patch, args.mode)?;
    if args.write {
        std::fs::write(&path, &patched)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), mode = %args.mode, "Patched config file");
    } else {
        print!("{}", patched);
        if !patched.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::vars::fixed_env;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn args(patch: &str, write: bool) -> PatchArgs {
        PatchArgs {
            patch: patch.to_string(),
            mode: EditMode::Additive,
            write,
        }
    }

    #[test]
    fn test_patch_must_be_object() {
        assert!(args("[1]", false).parse_patch().is_err());
        assert!(args("not json", false).parse_patch().is_err());
        assert!(args(r#"{"name": "x"}"#, false).parse_patch().is_ok());
    }

    #[test]
    fn test_write_updates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wrangler.jsonc");
        std::fs::write(&path, "{\n\t// keep me\n\t\"name\": \"app\"\n}").unwrap();

        let loader = ConfigLoader::new(
            Settings::default(),
            Arc::new(fixed_env(Vec::<(String, String)>::new())),
        );
        run_patch(
            &loader,
            LoadOptions::new(dir.path()),
            &args(r#"{"main": "src/index.ts"}"#, true),
        )
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("// keep me"));
        assert!(written.contains("\"main\": \"src/index.ts\""));
    }
}
