//! Structured error types for config resolution, parsing, patching and loading.

use crate::format::{ConfigFormat, Location};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // File errors
    FileRead,
    UnsupportedEncoding,
    InvalidUtf8,

    // Format errors
    ParseFailed,
    SerializeFailed,
    UnsupportedFormat,

    // Resolution errors
    MalformedRedirect,
    MissingRedirectConfigPath,
    RedirectTargetMissing,
    AmbiguousRedirect,
    ConfigNotFound,

    // Patch errors
    TomlCommentsPresent,
    InvalidEdit,

    // Programmatic load errors
    BundleFailed,
    BundlerUnavailable,
    UnsupportedDefaultExport,
    ModuleLoadFailed,

    // Validation
    InvalidConfig,
}

/// Failure to read a config file from disk.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Could not read file \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Configuration file \"{}\" has a {encoding} byte order mark. \
         Only UTF-8 encoded files are supported; please re-save the file as UTF-8.",
        .path.display()
    )]
    UnsupportedEncoding { path: PathBuf, encoding: &'static str },

    #[error("Configuration file \"{}\" is not valid UTF-8: {source}", .path.display())]
    InvalidUtf8 {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl FileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FileError::Read { .. } => ErrorCode::FileRead,
            FileError::UnsupportedEncoding { .. } => ErrorCode::UnsupportedEncoding,
            FileError::InvalidUtf8 { .. } => ErrorCode::InvalidUtf8,
        }
    }
}

/// Failure to parse or serialize one of the supported formats.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormatError {
    #[error("{}", parse_message(.format, .message, .location))]
    Parse {
        format: ConfigFormat,
        message: String,
        location: Option<Location>,
    },

    #[error("Could not serialize {format} configuration: {message}")]
    Serialize {
        format: ConfigFormat,
        message: String,
    },

    #[error("Unsupported configuration file \"{}\": expected a .json, .jsonc or .toml file", .path.display())]
    UnsupportedFormat { path: PathBuf },
}

fn parse_message(format: &ConfigFormat, message: &str, location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(
            "Could not parse {} at line {}, column {}: {}",
            format, loc.line, loc.column, message
        ),
        None => format!("Could not parse {}: {}", format, message),
    }
}

impl FormatError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FormatError::Parse { .. } => ErrorCode::ParseFailed,
            FormatError::Serialize { .. } => ErrorCode::SerializeFailed,
            FormatError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
        }
    }

    /// Location of a parse failure, when one is known.
    pub fn location(&self) -> Option<Location> {
        match self {
            FormatError::Parse { location, .. } => *location,
            _ => None,
        }
    }
}

/// Fatal problems discovering the authoritative config file.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("Failed to parse the deploy configuration file at \"{}\"", .path.display())]
    MalformedRedirect {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error(
        "A deploy configuration file was found at \"{}\".\n\
         But this is not valid - the required \"configPath\" property was not found.\n\
         Instead this file contains:\n```\n{contents}\n```",
        .path.display()
    )]
    MissingRedirectConfigPath { path: PathBuf, contents: String },

    #[error(
        "There is a deploy configuration at \"{}\".\n\
         But the redirected configuration path it points to, \"{}\", does not exist.",
        .deploy_config_path.display(),
        .target.display()
    )]
    RedirectTargetMissing {
        deploy_config_path: PathBuf,
        target: PathBuf,
    },

    #[error(
        "Found both a user configuration file at \"{}\"\n\
         and a deploy configuration file at \"{}\".\n\
         But these do not share the same base path so it is not clear which should be used.",
        .user_config_path.display(),
        .deploy_config_path.display()
    )]
    AmbiguousRedirect {
        user_config_path: PathBuf,
        deploy_config_path: PathBuf,
    },

    #[error(transparent)]
    File(#[from] FileError),
}

impl LocateError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LocateError::MalformedRedirect { .. } => ErrorCode::MalformedRedirect,
            LocateError::MissingRedirectConfigPath { .. } => ErrorCode::MissingRedirectConfigPath,
            LocateError::RedirectTargetMissing { .. } => ErrorCode::RedirectTargetMissing,
            LocateError::AmbiguousRedirect { .. } => ErrorCode::AmbiguousRedirect,
            LocateError::File(err) => err.code(),
        }
    }
}

/// Failures while computing or applying a config patch.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Cannot patch a TOML configuration that contains comments; they would be lost")]
    TomlCommentsPresent,

    #[error("Cannot apply edit at {path}: {message}")]
    InvalidEdit { path: String, message: String },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl PatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PatchError::TomlCommentsPresent => ErrorCode::TomlCommentsPresent,
            PatchError::InvalidEdit { .. } => ErrorCode::InvalidEdit,
            PatchError::Format(err) => err.code(),
            PatchError::File(err) => err.code(),
        }
    }
}

/// Failures loading a code-based (programmatic) config.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to bundle \"{}\":\n{}", .path.display(), .errors.join("\n"))]
    Bundle { path: PathBuf, errors: Vec<String> },

    #[error("Could not run the bundler for \"{}\"", .path.display())]
    BundlerUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "The default export of \"{}\" must be a config object or a function returning one, but got {kind}",
        .path.display()
    )]
    UnsupportedDefaultExport { path: PathBuf, kind: String },

    #[error("Failed to load \"{}\"", .path.display())]
    Module {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Could not prepare a temporary build artifact for \"{}\"", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LoadError::Bundle { .. } => ErrorCode::BundleFailed,
            LoadError::BundlerUnavailable { .. } => ErrorCode::BundlerUnavailable,
            LoadError::UnsupportedDefaultExport { .. } => ErrorCode::UnsupportedDefaultExport,
            LoadError::Module { .. } | LoadError::Artifact { .. } => ErrorCode::ModuleLoadFailed,
        }
    }
}

/// Umbrella error for the config loader facade.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Could not find a configuration file (wrangler.json, wrangler.jsonc, wrangler.toml or cf.config.*) in \"{}\" or any parent directory",
        .start.display()
    )]
    NotFound { start: PathBuf },

    #[error("Invalid configuration:\n{rendered}")]
    Invalid { rendered: String },

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::NotFound { .. } => ErrorCode::ConfigNotFound,
            ConfigError::Invalid { .. } => ErrorCode::InvalidConfig,
            ConfigError::Locate(err) => err.code(),
            ConfigError::File(err) => err.code(),
            ConfigError::Format(err) => err.code(),
            ConfigError::Load(err) => err.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::MissingRedirectConfigPath).unwrap();
        assert_eq!(json, "\"MISSING_REDIRECT_CONFIG_PATH\"");
    }

    #[test]
    fn test_parse_error_message_includes_location() {
        let err = FormatError::Parse {
            format: ConfigFormat::Jsonc,
            message: "PropertyNameExpected".to_string(),
            location: Some(Location { line: 3, column: 5 }),
        };
        assert_eq!(
            err.to_string(),
            "Could not parse JSONC at line 3, column 5: PropertyNameExpected"
        );
        assert_eq!(err.code(), ErrorCode::ParseFailed);
    }

    #[test]
    fn test_locate_errors_have_distinct_codes() {
        let codes = [
            LocateError::MissingRedirectConfigPath {
                path: PathBuf::new(),
                contents: String::new(),
            }
            .code(),
            LocateError::RedirectTargetMissing {
                deploy_config_path: PathBuf::new(),
                target: PathBuf::new(),
            }
            .code(),
            LocateError::AmbiguousRedirect {
                user_config_path: PathBuf::new(),
                deploy_config_path: PathBuf::new(),
            }
            .code(),
            LocateError::MalformedRedirect {
                path: PathBuf::new(),
                source: FormatError::Parse {
                    format: ConfigFormat::Jsonc,
                    message: String::new(),
                    location: None,
                },
            }
            .code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
