//! Watch sessions: rebuild and reload a code-based config on every change.

use super::bundler::BundleWatcher;
use super::loader::{ProgrammaticLoader, WorkerConfig, import_config};
use super::runtime::ModuleRuntime;
use crate::error::LoadError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub type ChangeCallback = Arc<dyn Fn(WorkerConfig) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(LoadError) + Send + Sync>;

#[derive(Debug, Default)]
struct SessionState {
    /// Incremented for every load started and on close
    generation: u64,
    closed: bool,
}

struct Shared {
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    artifact: PathBuf,
    config_path: PathBuf,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.generation += 1;
        }
        self.cancel.cancel();
        remove_artifact(&self.artifact);
        info!(path = %self.config_path.display(), "Stopped watching programmatic config");
    }
}

/// Owned by the session handles only, never by background tasks.
struct Handle {
    shared: Arc<Shared>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Handle to a running watch. Clones refer to the same session.
///
/// Callbacks run while the session lock is held, so once [`close`] returns
/// no callback will run again. A callback must not call `close` directly;
/// it may spawn a task that does. Dropping the last clone closes the
/// session.
///
/// [`close`]: WatchSession::close
#[derive(Clone)]
pub struct WatchSession {
    handle: Arc<Handle>,
}

impl WatchSession {
    pub(crate) async fn start(
        loader: &ProgrammaticLoader,
        config_path: &Path,
        env: Option<String>,
        on_change: ChangeCallback,
        on_error: ErrorCallback,
    ) -> Result<Self, LoadError> {
        let artifact = loader
            .new_artifact(config_path)
            .await?
            .keep()
            .map_err(|e| LoadError::Artifact {
                path: config_path.to_path_buf(),
                source: e.error,
            })?;

        let BundleWatcher { mut reports, cancel } =
            match loader.bundler.watch(config_path, &artifact).await {
                Ok(watcher) => watcher,
                Err(e) => {
                    remove_artifact(&artifact);
                    return Err(e);
                }
            };

        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::default()),
            cancel,
            artifact,
            config_path: config_path.to_path_buf(),
        });
        info!(path = %config_path.display(), "Watching programmatic config");

        let runtime = loader.runtime.clone();
        let driver = shared.clone();
        tokio::spawn(async move {
            let mut initial = true;
            loop {
                let report = tokio::select! {
                    _ = driver.cancel.cancelled() => break,
                    report = reports.recv() => match report {
                        Some(report) => report,
                        None => break,
                    },
                };

                if std::mem::take(&mut initial) {
                    debug!(path = %driver.config_path.display(), "initial build finished");
                    continue;
                }

                if !report.succeeded() {
                    let error = LoadError::Bundle {
                        path: driver.config_path.clone(),
                        errors: report.errors,
                    };
                    let state = driver.lock();
                    if !state.closed {
                        on_error(error);
                    }
                    continue;
                }

                let generation = {
                    let mut state = driver.lock();
                    if state.closed {
                        break;
                    }
                    state.generation += 1;
                    state.generation
                };
                debug!(generation, "config rebuilt, loading");
                tokio::spawn(load_generation(
                    driver.clone(),
                    runtime.clone(),
                    env.clone(),
                    generation,
                    on_change.clone(),
                    on_error.clone(),
                ));
            }
            debug!(path = %driver.config_path.display(), "watch driver stopped");
        });

        Ok(Self {
            handle: Arc::new(Handle { shared }),
        })
    }

    /// Stop watching and remove the build artifact. Idempotent.
    pub fn close(&self) {
        self.handle.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.handle.shared.lock().closed
    }

    /// Path of the artifact rebuilt on every change.
    pub fn artifact(&self) -> &Path {
        &self.handle.shared.artifact
    }
}

async fn load_generation(
    shared: Arc<Shared>,
    runtime: Arc<dyn ModuleRuntime>,
    env: Option<String>,
    generation: u64,
    on_change: ChangeCallback,
    on_error: ErrorCallback,
) {
    let result = import_config(
        runtime.as_ref(),
        &shared.config_path,
        &shared.artifact,
        env.as_deref(),
    )
    .await;

    let state = shared.lock();
    if state.closed || state.generation != generation {
        debug!(
            generation,
            current = state.generation,
            "discarding superseded config load"
        );
        return;
    }
    match result {
        Ok(config) => on_change(config),
        Err(e) => on_error(e),
    }
}

fn remove_artifact(artifact: &Path) {
    if let Err(e) = std::fs::remove_file(artifact) {
        debug!(artifact = %artifact.display(), "could not remove build artifact: {}", e);
    }
}
