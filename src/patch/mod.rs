//! Format-preserving partial edits of a config file.
//!
//! A patch is flattened into path operations which are applied one at a time
//! to a token-aware document, so comments and formatting outside the edited
//! regions survive in JSON and JSONC files. TOML files are edited through
//! their JSON rendering and re-serialized, which is only safe when they carry
//! no comments.

pub mod ops;

pub use ops::{EditMode, PatchNode, PatchOperation, flatten};

use crate::config::files::read_config_file;
use crate::error::{FormatError, PatchError};
use crate::format::{self, ConfigFormat, FormattingOptions, ModifyOptions, TokenDocument};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Apply `patch` to the text of a config file and return the new text.
pub fn patch_config_text(
    current: &str,
    config_format: ConfigFormat,
    patch: &PatchNode,
    mode: EditMode,
) -> Result<String, PatchError> {
    if config_format == ConfigFormat::Toml && current.contains('#') {
        return Err(PatchError::TomlCommentsPresent);
    }

    let mut document = format::parse(current, config_format)?.document;
    let options = ModifyOptions {
        is_array_insertion: mode.is_array_insertion(),
    };

    for operation in flatten(patch, mode) {
        debug!(%operation, "applying patch operation");
        document
            .set(&operation.path, operation.value.as_ref(), options)
            .map_err(|e| PatchError::InvalidEdit {
                path: e.path,
                message: e.message,
            })?;
    }

    document
        .format(&FormattingOptions::default())
        .map_err(|e| PatchError::InvalidEdit {
            path: e.path,
            message: e.message,
        })?;

    match config_format {
        ConfigFormat::Json | ConfigFormat::Jsonc => Ok(document.into_text()),
        ConfigFormat::Toml => to_toml(&document),
    }
}

fn to_toml(document: &TokenDocument) -> Result<String, PatchError> {
    let value = document.value().map_err(|e| FormatError::Parse {
        format: ConfigFormat::Toml,
        message: e.kind.to_string(),
        location: None,
    })?;
    let table = match value {
        Some(Value::Object(map)) => map,
        _ => Default::default(),
    };
    Ok(format::serialize(&table, ConfigFormat::Toml)?)
}

/// Read the config at `path` and return its patched text. The file is not
/// written.
pub fn patch_config_file(
    path: &Path,
    patch: &PatchNode,
    mode: EditMode,
) -> Result<String, PatchError> {
    let config_format = ConfigFormat::from_path(path)?;
    let current = read_config_file(path)?;
    patch_config_text(&current, config_format, patch, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_toml_with_comments_is_refused() {
        let err = patch_config_text(
            "# my worker\nname = \"w\"\n",
            ConfigFormat::Toml,
            &PatchNode::from(json!({"main": "index.js"})),
            EditMode::Additive,
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::TomlCommentsPresent));
    }

    #[test]
    fn test_jsonc_comment_survives_edit() {
        let out = patch_config_text(
            "{\n\t// the worker\n\t\"name\": \"w\"\n}",
            ConfigFormat::Jsonc,
            &PatchNode::from(json!({"name": "renamed"})),
            EditMode::Replacing,
        )
        .unwrap();
        assert_eq!(out, "{\n\t// the worker\n\t\"name\": \"renamed\"\n}");
    }

    #[test]
    fn test_invalid_document_is_parse_error() {
        let err = patch_config_text(
            "{\"name\": ",
            ConfigFormat::Json,
            &PatchNode::from(json!({"main": "x"})),
            EditMode::Additive,
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::Format(FormatError::Parse { .. })));
    }
}
