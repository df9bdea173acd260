//! Reading a config for a target environment.
//!
//! Locates the authoritative file, reads it (statically or by evaluating a
//! code-based config), validates and resolves it, and reports diagnostics.

use super::files::read_config_file;
use super::locator::{ConfigPaths, LocateOptions, is_programmatic_config, resolve_config_paths};
use super::settings::Settings;
use crate::environment::{Config, Diagnostics, NormalizeArgs, normalize_and_validate_config};
use crate::error::{ConfigError, FormatError};
use crate::format::{self, ConfigFormat};
use crate::programmatic::ProgrammaticLoader;
use crate::vars::EnvVars;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// What to read and how to resolve it.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory the search starts from
    pub cwd: PathBuf,
    /// Explicit config file; skips discovery and redirects
    pub config: Option<PathBuf>,
    /// Follow a redirect descriptor when one is found
    pub use_redirect: bool,
    pub args: NormalizeArgs,
}

impl LoadOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config: None,
            use_redirect: true,
            args: NormalizeArgs::default(),
        }
    }
}

/// A resolved config together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub paths: ConfigPaths,
    pub config: Config,
    /// Warnings only; a config with errors is never returned
    pub diagnostics: Diagnostics,
}

/// Entry point for reading configs.
pub struct ConfigLoader {
    settings: Settings,
    vars: Arc<dyn EnvVars>,
    programmatic: ProgrammaticLoader,
}

impl ConfigLoader {
    pub fn new(settings: Settings, vars: Arc<dyn EnvVars>) -> Self {
        let programmatic = ProgrammaticLoader::from_settings(settings.clone());
        Self {
            settings,
            vars,
            programmatic,
        }
    }

    /// Replace the loader used for `cf.config.*` files.
    pub fn with_programmatic_loader(mut self, loader: ProgrammaticLoader) -> Self {
        self.programmatic = loader;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn programmatic(&self) -> &ProgrammaticLoader {
        &self.programmatic
    }

    pub fn locate(&self, options: &LoadOptions) -> Result<ConfigPaths, ConfigError> {
        let locate = LocateOptions {
            use_redirect: options.use_redirect,
            ..LocateOptions::from_settings(&self.settings)
        };
        Ok(resolve_config_paths(
            &options.cwd,
            options.config.as_deref(),
            &locate,
        )?)
    }

    /// The raw top-level table of the config at `path`.
    ///
    /// Code-based configs are evaluated for `env`.
    pub async fn read_raw(
        &self,
        path: &Path,
        env: Option<&str>,
    ) -> Result<Map<String, Value>, ConfigError> {
        if is_programmatic_config(path) {
            debug!(path = %path.display(), "evaluating programmatic config");
            return Ok(self.programmatic.load(path, env).await?);
        }

        let config_format = ConfigFormat::from_path(path)?;
        let text = read_config_file(path)?;
        match format::parse_value(&text, config_format)? {
            Some(Value::Object(map)) => Ok(map),
            None => Ok(Map::new()),
            Some(_) => Err(FormatError::Parse {
                format: config_format,
                message: "the top level of a config file must be an object".to_string(),
                location: None,
            }
            .into()),
        }
    }

    /// Locate, read and resolve a config.
    ///
    /// Warnings are logged and returned; errors fail the load.
    pub async fn load(&self, options: &LoadOptions) -> Result<LoadedConfig, ConfigError> {
        let paths = self.locate(options)?;
        let Some(config_path) = paths.config_path.clone() else {
            return Err(ConfigError::NotFound {
                start: options.cwd.clone(),
            });
        };

        let env = options.args.env.as_deref();
        let raw = self.read_raw(&config_path, env).await?;

        let mut args = options.args.clone();
        if is_programmatic_config(&config_path) && !raw.contains_key("env") {
            // Already evaluated for this environment.
            args.env = None;
        }

        let (config, diagnostics) =
            normalize_and_validate_config(&raw, Some(&config_path), &args, self.vars.as_ref());
        report(&diagnostics)?;

        Ok(LoadedConfig {
            paths,
            config,
            diagnostics,
        })
    }
}

/// Log warnings and fail on errors.
pub fn report(diagnostics: &Diagnostics) -> Result<(), ConfigError> {
    if diagnostics.has_warnings() {
        warn!("{}", diagnostics.render_warnings());
    }
    if diagnostics.has_errors() {
        return Err(ConfigError::Invalid {
            rendered: diagnostics.render_errors(),
        });
    }
    Ok(())
}
