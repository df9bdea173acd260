//! Tool settings: executables, directory names and timings.

use crate::vars::EnvVars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const ENV_ESBUILD_PATH: &str = "WRANGLER_ESBUILD_PATH";
pub const ENV_NODE_PATH: &str = "WRANGLER_NODE_PATH";
pub const ENV_WATCH_DEBOUNCE_MS: &str = "WRANGLER_CONFIG_WATCH_DEBOUNCE_MS";
pub const ENV_DISABLE_EXPERIMENTAL_WARNING: &str = "WRANGLER_DISABLE_EXPERIMENTAL_WARNING";
pub const ENV_LOG: &str = "WRANGLER_CONFIG_LOG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Bundler executable used for code-based configs
    #[serde(default = "default_esbuild_path")]
    pub esbuild_path: PathBuf,

    /// JavaScript runtime used to evaluate bundled configs
    #[serde(default = "default_node_path")]
    pub node_path: PathBuf,

    /// Project-local state directory (holds the redirect descriptor and build artifacts)
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Debounce window for filesystem events in watch mode
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            esbuild_path: default_esbuild_path(),
            node_path: default_node_path(),
            state_dir: default_state_dir(),
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

fn default_esbuild_path() -> PathBuf {
    PathBuf::from("esbuild")
}

fn default_node_path() -> PathBuf {
    PathBuf::from("node")
}

fn default_state_dir() -> String {
    ".wrangler".to_string()
}

fn default_watch_debounce_ms() -> u64 {
    100
}

impl Settings {
    /// Defaults with environment variable overrides applied.
    pub fn from_env(env: &dyn EnvVars) -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides(env);
        settings
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self, env: &dyn EnvVars) {
        if let Some(path) = env.get(ENV_ESBUILD_PATH).filter(|p| !p.is_empty()) {
            self.esbuild_path = PathBuf::from(path);
        }

        if let Some(path) = env.get(ENV_NODE_PATH).filter(|p| !p.is_empty()) {
            self.node_path = PathBuf::from(path);
        }

        if let Some(raw) = env.get(ENV_WATCH_DEBOUNCE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.watch_debounce_ms = ms,
                Err(_) => warn!(
                    "Ignoring {}={:?}: expected a number of milliseconds",
                    ENV_WATCH_DEBOUNCE_MS, raw
                ),
            }
        }
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    /// `<state_dir>/deploy/config.json`, relative to a project directory.
    pub fn redirect_descriptor(&self) -> PathBuf {
        PathBuf::from(&self.state_dir).join("deploy").join("config.json")
    }

    /// `<state_dir>/tmp`, relative to a project directory.
    pub fn artifact_dir(&self) -> PathBuf {
        PathBuf::from(&self.state_dir).join("tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::fixed_env;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.esbuild_path, PathBuf::from("esbuild"));
        assert_eq!(settings.watch_debounce(), Duration::from_millis(100));
        assert_eq!(
            settings.redirect_descriptor(),
            PathBuf::from(".wrangler/deploy/config.json")
        );
    }

    #[test]
    fn test_env_overrides() {
        let env = fixed_env([
            (ENV_ESBUILD_PATH, "/opt/esbuild"),
            (ENV_NODE_PATH, ""),
            (ENV_WATCH_DEBOUNCE_MS, "250"),
        ]);
        let settings = Settings::from_env(&env);
        assert_eq!(settings.esbuild_path, PathBuf::from("/opt/esbuild"));
        assert_eq!(settings.node_path, PathBuf::from("node"));
        assert_eq!(settings.watch_debounce_ms, 250);
    }

    #[test]
    fn test_bad_debounce_is_ignored() {
        let env = fixed_env([(ENV_WATCH_DEBOUNCE_MS, "soon")]);
        assert_eq!(Settings::from_env(&env).watch_debounce_ms, 100);
    }

    #[test]
    fn test_partial_settings_deserialize_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"node_path": "/usr/bin/node"}"#).unwrap();
        assert_eq!(settings.node_path, PathBuf::from("/usr/bin/node"));
        assert_eq!(settings.state_dir, ".wrangler");
    }
}
