//! Discovery of the authoritative config file.
//!
//! The nearest directory containing any recognized config name wins; within
//! one directory, names are tried in priority order. A redirect descriptor
//! (`.wrangler/deploy/config.json`) found further up may point at a
//! generated config instead.

use crate::environment::normalize::absolute;
use crate::error::LocateError;
use crate::format::{self, ConfigFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::files::read_config_file;
use super::settings::Settings;

/// Recognized config names, highest priority first. Code-based configs come
/// ahead of static ones.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "cf.config.ts",
    "cf.config.mts",
    "cf.config.js",
    "cf.config.mjs",
    "wrangler.json",
    "wrangler.jsonc",
    "wrangler.toml",
];

/// Result of config discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPaths {
    /// The file that should actually be read
    pub config_path: Option<PathBuf>,
    /// The file ordinary upward search found (or the explicit path)
    pub user_config_path: Option<PathBuf>,
    /// The redirect descriptor, when one was followed
    pub deploy_config_path: Option<PathBuf>,
    pub redirected: bool,
}

#[derive(Debug, Clone)]
pub struct LocateOptions {
    /// Follow a redirect descriptor if one is found
    pub use_redirect: bool,
    /// Descriptor location relative to a project directory
    pub redirect_descriptor: PathBuf,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl LocateOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            use_redirect: true,
            redirect_descriptor: settings.redirect_descriptor(),
        }
    }
}

/// Whether a config path names a code-based config.
pub fn is_programmatic_config(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("cf.config."))
}

/// Walk up from `start` and return the first existing `start/../name`.
///
/// At each directory every name is tried in order before moving up. A
/// relative `start` is taken from the current directory.
pub fn find_up(start: &Path, names: &[&Path]) -> Option<PathBuf> {
    let start = absolute(start);
    for dir in start.ancestors() {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Nearest recognized config file at or above `start`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let names: Vec<&Path> = CONFIG_FILE_NAMES.iter().map(Path::new).collect();
    find_up(start, &names)
}

/// Work out which config file to use.
pub fn resolve_config_paths(
    start: &Path,
    explicit: Option<&Path>,
    options: &LocateOptions,
) -> Result<ConfigPaths, LocateError> {
    if let Some(explicit) = explicit {
        return Ok(ConfigPaths {
            config_path: Some(explicit.to_path_buf()),
            user_config_path: Some(explicit.to_path_buf()),
            deploy_config_path: None,
            redirected: false,
        });
    }

    let user_config_path = find_config(start);
    debug!(?user_config_path, start = %start.display(), "config search finished");

    if !options.use_redirect {
        return Ok(ConfigPaths {
            config_path: user_config_path.clone(),
            user_config_path,
            deploy_config_path: None,
            redirected: false,
        });
    }

    let Some(deploy_config_path) = find_up(start, &[options.redirect_descriptor.as_path()]) else {
        return Ok(ConfigPaths {
            config_path: user_config_path.clone(),
            user_config_path,
            deploy_config_path: None,
            redirected: false,
        });
    };

    let target = read_redirect_target(&deploy_config_path)?;

    if let Some(user_config) = &user_config_path {
        let expected = user_config
            .parent()
            .unwrap_or(Path::new(""))
            .join(&options.redirect_descriptor);
        if expected != deploy_config_path {
            return Err(LocateError::AmbiguousRedirect {
                user_config_path: user_config.clone(),
                deploy_config_path,
            });
        }
    }

    info!(
        config_path = %target.display(),
        user_config_path = ?user_config_path,
        deploy_config_path = %deploy_config_path.display(),
        "Using redirected configuration"
    );

    Ok(ConfigPaths {
        config_path: Some(target),
        user_config_path,
        deploy_config_path: Some(deploy_config_path),
        redirected: true,
    })
}

/// Parse a redirect descriptor and return the existing file it points at.
fn read_redirect_target(descriptor: &Path) -> Result<PathBuf, LocateError> {
    let contents = read_config_file(descriptor)?;
    let value = format::parse_value(&contents, ConfigFormat::Jsonc).map_err(|source| {
        LocateError::MalformedRedirect {
            path: descriptor.to_path_buf(),
            source,
        }
    })?;

    let Some(config_path) = value
        .as_ref()
        .and_then(|v| v.get("configPath"))
        .and_then(|v| v.as_str())
    else {
        return Err(LocateError::MissingRedirectConfigPath {
            path: descriptor.to_path_buf(),
            contents,
        });
    };

    let base = descriptor.parent().unwrap_or(Path::new(""));
    let target = base.join(config_path);
    if !target.exists() {
        return Err(LocateError::RedirectTargetMissing {
            deploy_config_path: descriptor.to_path_buf(),
            target,
        });
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_skips_search() {
        let paths = resolve_config_paths(
            Path::new("/does/not/exist"),
            Some(Path::new("custom.toml")),
            &LocateOptions::default(),
        )
        .unwrap();
        assert_eq!(paths.config_path, Some(PathBuf::from("custom.toml")));
        assert_eq!(paths.user_config_path, paths.config_path);
        assert!(!paths.redirected);
    }

    #[test]
    fn test_priority_within_one_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("wrangler.toml"), "").unwrap();
        std::fs::write(temp.path().join("wrangler.json"), "{}").unwrap();
        assert_eq!(find_config(temp.path()), Some(temp.path().join("wrangler.json")));

        std::fs::write(temp.path().join("cf.config.ts"), "").unwrap();
        assert_eq!(find_config(temp.path()), Some(temp.path().join("cf.config.ts")));
    }

    #[test]
    fn test_directory_is_not_a_match() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("wrangler.json")).unwrap();
        assert_eq!(find_config(temp.path()), None);
    }

    #[test]
    fn test_is_programmatic_config() {
        assert!(is_programmatic_config(Path::new("a/cf.config.mts")));
        assert!(!is_programmatic_config(Path::new("a/wrangler.jsonc")));
    }

    #[test]
    fn test_redirect_serializes_camel_case() {
        let paths = ConfigPaths {
            config_path: Some(PathBuf::from("a")),
            user_config_path: None,
            deploy_config_path: None,
            redirected: false,
        };
        let json = serde_json::to_value(&paths).unwrap();
        assert_eq!(json["configPath"], "a");
        assert!(json["userConfigPath"].is_null());
    }
}
