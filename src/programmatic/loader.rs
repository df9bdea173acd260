//! One-shot loading of a code-based config.

use super::bundler::{Bundler, EsbuildBundler};
use super::runtime::{DefaultExport, ModuleRuntime, NodeRuntime};
use super::watch::WatchSession;
use crate::config::settings::Settings;
use crate::error::LoadError;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::debug;

/// The object a config module produces.
pub type WorkerConfig = Map<String, Value>;

/// Builds and evaluates `cf.config.*` files.
#[derive(Clone)]
pub struct ProgrammaticLoader {
    pub(crate) bundler: Arc<dyn Bundler>,
    pub(crate) runtime: Arc<dyn ModuleRuntime>,
    pub(crate) settings: Settings,
}

impl ProgrammaticLoader {
    pub fn new(
        bundler: Arc<dyn Bundler>,
        runtime: Arc<dyn ModuleRuntime>,
        settings: Settings,
    ) -> Self {
        Self {
            bundler,
            runtime,
            settings,
        }
    }

    /// A loader using `esbuild` and `node` from `settings`.
    pub fn from_settings(settings: Settings) -> Self {
        let bundler = EsbuildBundler::new(&settings.esbuild_path, settings.watch_debounce());
        let runtime = NodeRuntime::new(&settings.node_path);
        Self::new(Arc::new(bundler), Arc::new(runtime), settings)
    }

    /// `<config dir>/<state_dir>/tmp`, created if missing.
    pub(crate) async fn artifact_dir(&self, config_path: &Path) -> Result<PathBuf, LoadError> {
        let dir = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(self.settings.artifact_dir());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| LoadError::Artifact {
                path: config_path.to_path_buf(),
                source,
            })?;
        Ok(dir)
    }

    /// A fresh, uniquely named artifact path inside the artifact directory.
    pub(crate) async fn new_artifact(&self, config_path: &Path) -> Result<TempPath, LoadError> {
        let dir = self.artifact_dir(config_path).await?;
        tempfile::Builder::new()
            .prefix("cf-config-")
            .suffix(".mjs")
            .tempfile_in(&dir)
            .map(|file| file.into_temp_path())
            .map_err(|source| LoadError::Artifact {
                path: config_path.to_path_buf(),
                source,
            })
    }

    /// Bundle, import and evaluate the config at `config_path` for `env`.
    pub async fn load(
        &self,
        config_path: &Path,
        env: Option<&str>,
    ) -> Result<WorkerConfig, LoadError> {
        let artifact = self.new_artifact(config_path).await?;
        let result = self.build_and_import(config_path, &artifact, env).await;
        remove_artifact(artifact);
        result
    }

    async fn build_and_import(
        &self,
        config_path: &Path,
        artifact: &Path,
        env: Option<&str>,
    ) -> Result<WorkerConfig, LoadError> {
        let report = self.bundler.build(config_path, artifact).await?;
        for warning in &report.warnings {
            debug!(path = %config_path.display(), "bundler warning: {}", warning);
        }
        if !report.succeeded() {
            return Err(LoadError::Bundle {
                path: config_path.to_path_buf(),
                errors: report.errors,
            });
        }
        import_config(self.runtime.as_ref(), config_path, artifact, env).await
    }

    /// Rebuild and re-evaluate the config whenever its sources change.
    ///
    /// The initial build is not delivered. Each later successful build is
    /// loaded and passed to `on_change`, unless a newer build has started or
    /// the session was closed in the meantime. Build and load failures go to
    /// `on_error`.
    pub async fn watch<C, E>(
        &self,
        config_path: &Path,
        env: Option<&str>,
        on_change: C,
        on_error: E,
    ) -> Result<WatchSession, LoadError>
    where
        C: Fn(WorkerConfig) + Send + Sync + 'static,
        E: Fn(LoadError) + Send + Sync + 'static,
    {
        WatchSession::start(
            self,
            config_path,
            env.map(str::to_string),
            Arc::new(on_change),
            Arc::new(on_error),
        )
        .await
    }
}

/// Import `artifact` and turn its default export into a config object.
pub(crate) async fn import_config(
    runtime: &dyn ModuleRuntime,
    config_path: &Path,
    artifact: &Path,
    env: Option<&str>,
) -> Result<WorkerConfig, LoadError> {
    let module_error = |source: anyhow::Error| LoadError::Module {
        path: config_path.to_path_buf(),
        source,
    };

    let value = match runtime.import_default(artifact).await.map_err(module_error)? {
        DefaultExport::Function(function) => {
            let context = match env {
                Some(env) => json!({ "env": env }),
                None => json!({}),
            };
            function.call(context).await.map_err(module_error)?
        }
        DefaultExport::Value(value) => value,
        DefaultExport::Unsupported(kind) => {
            return Err(LoadError::UnsupportedDefaultExport {
                path: config_path.to_path_buf(),
                kind,
            });
        }
    };

    match value {
        Value::Object(config) => Ok(config),
        other => Err(LoadError::UnsupportedDefaultExport {
            path: config_path.to_path_buf(),
            kind: value_kind(&other).to_string(),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn remove_artifact(artifact: TempPath) {
    let path = artifact.to_path_buf();
    if let Err(e) = artifact.close() {
        debug!(artifact = %path.display(), "could not remove build artifact: {}", e);
    }
}
