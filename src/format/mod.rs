//! Format adapter: JSON, JSON with comments and TOML.
//!
//! Every format is parsed into a plain value plus a [`TokenDocument`] that
//! edits can be applied to. TOML documents are edited through their JSON
//! rendering and serialized back at the end.

pub mod document;
pub mod edit;
pub mod formatter;
pub mod scanner;
pub mod tree;

pub use document::TokenDocument;
pub use edit::{Edit, EditError, ModifyOptions};
pub use formatter::FormattingOptions;
pub use tree::{ParseOptions, PathSegment};

use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tree::ParseError;

/// One of the supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Jsonc,
    Toml,
}

impl ConfigFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("jsonc") => Ok(ConfigFormat::Jsonc),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(FormatError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFormat::Json => write!(f, "JSON"),
            ConfigFormat::Jsonc => write!(f, "JSONC"),
            ConfigFormat::Toml => write!(f, "TOML"),
        }
    }
}

/// 1-based position in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Line and column of a byte offset. `\r\n`, `\r` and `\n` each end a line.
    pub fn at(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let mut line = 1;
        let mut line_start = 0;
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < offset {
            match bytes[i] {
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') && i + 1 < offset {
                        i += 1;
                    }
                    line += 1;
                    line_start = i + 1;
                }
                b'\n' => {
                    line += 1;
                    line_start = i + 1;
                }
                _ => {}
            }
            i += 1;
        }
        let column = text
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start)
            + 1;
        Location { line, column }
    }
}

/// Result of parsing a config file.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub format: ConfigFormat,
    /// Plain view of the top-level table.
    pub value: Map<String, Value>,
    /// Editable document. For TOML this holds the compact JSON rendering.
    pub document: TokenDocument,
}

/// Parse `text` in the given format. The top level must be a table/object.
pub fn parse(text: &str, format: ConfigFormat) -> Result<ParsedConfig, FormatError> {
    match format {
        ConfigFormat::Json | ConfigFormat::Jsonc => {
            let value = parse_json_text(text, format)?;
            Ok(ParsedConfig {
                format,
                value,
                document: TokenDocument::new(text),
            })
        }
        ConfigFormat::Toml => {
            let value = parse_toml_text(text)?;
            let compact = serde_json::to_string(&value).map_err(|e| FormatError::Serialize {
                format: ConfigFormat::Jsonc,
                message: e.to_string(),
            })?;
            Ok(ParsedConfig {
                format,
                value,
                document: TokenDocument::new(compact),
            })
        }
    }
}

/// Parse JSON or JSONC into any value, not just an object.
pub fn parse_value(text: &str, format: ConfigFormat) -> Result<Option<Value>, FormatError> {
    let options = match format {
        ConfigFormat::Json => ParseOptions::JSON,
        ConfigFormat::Jsonc => ParseOptions::JSONC,
        ConfigFormat::Toml => {
            return parse_toml_text(text).map(|table| Some(Value::Object(table)));
        }
    };
    let root = tree::parse_tree(text, options).map_err(|e| parse_error(text, format, e))?;
    Ok(root.map(|node| node.to_value()))
}

fn parse_json_text(text: &str, format: ConfigFormat) -> Result<Map<String, Value>, FormatError> {
    let options = match format {
        ConfigFormat::Json => ParseOptions::JSON,
        _ => ParseOptions::JSONC,
    };
    let root = tree::parse_tree(text, options).map_err(|e| parse_error(text, format, e))?;
    match root {
        None => Ok(Map::new()),
        Some(node) => match node.to_value() {
            Value::Object(map) => Ok(map),
            _ => Err(FormatError::Parse {
                format,
                message: "expected an object at the top level".to_string(),
                location: Some(Location::at(text, node.offset)),
            }),
        },
    }
}

fn parse_error(text: &str, format: ConfigFormat, err: ParseError) -> FormatError {
    FormatError::Parse {
        format,
        message: err.kind.to_string(),
        location: Some(Location::at(text, err.offset)),
    }
}

fn parse_toml_text(text: &str) -> Result<Map<String, Value>, FormatError> {
    let table: toml::Table = text.parse().map_err(|e: toml::de::Error| FormatError::Parse {
        format: ConfigFormat::Toml,
        message: e.message().to_string(),
        location: e.span().map(|span| Location::at(text, span.start)),
    })?;
    Ok(toml_table_to_json(table))
}

/// Convert a TOML table into a JSON object. Date-times become strings.
pub fn toml_table_to_json(table: toml::Table) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect()
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(toml_table_to_json(table)),
    }
}

/// Convert a JSON object into a TOML table. `null` has no TOML form and is
/// dropped, both as a table entry and as an array element. Integers outside
/// the TOML range are refused.
pub fn json_to_toml_table(map: &Map<String, Value>) -> Result<toml::Table, FormatError> {
    let mut table = toml::Table::new();
    for (key, value) in map {
        if let Some(value) = json_to_toml(value)? {
            table.insert(key.clone(), value);
        }
    }
    Ok(table)
}

fn json_to_toml(value: &Value) -> Result<Option<toml::Value>, FormatError> {
    Ok(Some(match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                toml::Value::Integer(i)
            } else if n.is_f64()
                && let Some(f) = n.as_f64()
            {
                toml::Value::Float(f)
            } else {
                return Err(FormatError::Serialize {
                    format: ConfigFormat::Toml,
                    message: format!("integer {n} does not fit in a TOML integer"),
                });
            }
        }
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(item) = json_to_toml(item)? {
                    out.push(item);
                }
            }
            toml::Value::Array(out)
        }
        Value::Object(map) => toml::Value::Table(json_to_toml_table(map)?),
    }))
}

/// Serialize a top-level object in the given format.
///
/// JSON output is tab-indented without a trailing newline.
pub fn serialize(value: &Map<String, Value>, format: ConfigFormat) -> Result<String, FormatError> {
    match format {
        ConfigFormat::Json | ConfigFormat::Jsonc => {
            let compact = serde_json::to_string(value).map_err(|e| FormatError::Serialize {
                format,
                message: e.to_string(),
            })?;
            let mut document = TokenDocument::new(compact);
            document
                .format(&FormattingOptions::default())
                .map_err(|e| FormatError::Serialize {
                    format,
                    message: e.to_string(),
                })?;
            Ok(document.into_text())
        }
        ConfigFormat::Toml => {
            toml::to_string(&json_to_toml_table(value)?).map_err(|e| FormatError::Serialize {
                format,
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/wrangler.json")).unwrap(), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("wrangler.JSONC")).unwrap(), ConfigFormat::Jsonc);
        assert_eq!(ConfigFormat::from_path(Path::new("wrangler.toml")).unwrap(), ConfigFormat::Toml);
        let err = ConfigFormat::from_path(Path::new("cf.config.ts")).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_location_is_one_based() {
        let text = "{\n  \"a\": 1,\r\n  x\n}";
        let offset = text.find('x').unwrap();
        assert_eq!(Location::at(text, offset), Location { line: 3, column: 3 });
        assert_eq!(Location::at(text, 0), Location { line: 1, column: 1 });
    }

    #[test]
    fn test_jsonc_parse_error_has_location() {
        let err = parse("{\n  \"a\": 1,\n  b: 2\n}", ConfigFormat::Jsonc).unwrap_err();
        assert_eq!(err.location(), Some(Location { line: 3, column: 3 }));
        assert_eq!(
            err.to_string(),
            "Could not parse JSONC at line 3, column 3: InvalidSymbol"
        );
    }

    #[test]
    fn test_json_rejects_comments_jsonc_accepts() {
        let text = "{\n  // c\n  \"a\": 1,\n}";
        assert!(parse(text, ConfigFormat::Json).is_err());
        let parsed = parse(text, ConfigFormat::Jsonc).unwrap();
        assert_eq!(Value::Object(parsed.value), json!({"a": 1}));
        assert_eq!(parsed.document.text(), text);
    }

    #[test]
    fn test_top_level_must_be_object() {
        let err = parse("[1]", ConfigFormat::Json).unwrap_err();
        assert_eq!(err.location(), Some(Location { line: 1, column: 1 }));
    }

    #[test]
    fn test_toml_becomes_compact_json_document() {
        let text = "name = \"w\"\nwhen = 1979-05-27T07:32:00Z\n\n[[kv_namespaces]]\nbinding = \"KV\"\n";
        let parsed = parse(text, ConfigFormat::Toml).unwrap();
        assert_eq!(
            Value::Object(parsed.value.clone()),
            json!({"name": "w", "when": "1979-05-27T07:32:00Z", "kv_namespaces": [{"binding": "KV"}]})
        );
        assert_eq!(
            parsed.document.text(),
            r#"{"name":"w","when":"1979-05-27T07:32:00Z","kv_namespaces":[{"binding":"KV"}]}"#
        );
    }

    #[test]
    fn test_toml_parse_error() {
        let err = parse("name = \n", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, FormatError::Parse { format: ConfigFormat::Toml, .. }));
        assert!(err.location().is_some());
    }

    #[test]
    fn test_serialize_toml_drops_nulls() {
        let value = json!({"name": "w", "gone": null, "flags": ["a", null, "b"], "kv": [{"binding": "KV"}]});
        let text = serialize(value.as_object().unwrap(), ConfigFormat::Toml).unwrap();
        let back: toml::Table = text.parse().unwrap();
        assert_eq!(
            Value::Object(toml_table_to_json(back)),
            json!({"name": "w", "flags": ["a", "b"], "kv": [{"binding": "KV"}]})
        );
    }

    #[test]
    fn test_serialize_toml_refuses_out_of_range_integers() {
        let value = json!({"limits": {"cpu_ms": u64::MAX}});
        let err = serialize(value.as_object().unwrap(), ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, FormatError::Serialize { format: ConfigFormat::Toml, .. }));
        assert!(err.to_string().contains("18446744073709551615"));

        let value = json!({"max": i64::MAX, "ratio": 0.5});
        let text = serialize(value.as_object().unwrap(), ConfigFormat::Toml).unwrap();
        let back: toml::Table = text.parse().unwrap();
        assert_eq!(Value::Object(toml_table_to_json(back)), value);
    }

    #[test]
    fn test_invalid_escape_before_non_ascii_is_a_parse_error() {
        let err = parse("{\"name\": \"\\é\"}", ConfigFormat::Jsonc).unwrap_err();
        assert_eq!(err.location(), Some(Location { line: 1, column: 10 }));
        assert!(err.to_string().ends_with("InvalidEscapeCharacter"));

        let err = parse("{\"vars\": {\"A\": \"\\ü\"}}", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, FormatError::Parse { .. }));
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let text = format!("{{\"a\": {}{}}}", "[".repeat(100_000), "]".repeat(100_000));
        let err = parse(&text, ConfigFormat::Jsonc).unwrap_err();
        assert_eq!(err.location().map(|l| l.line), Some(1));
        assert!(err.to_string().ends_with("NestingTooDeep"));
    }

    #[test]
    fn test_mangled_non_ascii_documents_fail_cleanly() {
        let sample = "{\n\t// ünïcode\n\t\"name\": \"wörker-😀\",\n\t\"vars\": {\"A\": \"\\u00e9\"}\n}";
        for (i, _) in sample.char_indices() {
            for insert in ["\\", "\"", "é", "/*", "["] {
                let mut text = String::from(&sample[..i]);
                text.push_str(insert);
                text.push_str(&sample[i..]);
                if let Err(err) = parse(&text, ConfigFormat::Jsonc) {
                    assert!(matches!(err, FormatError::Parse { .. }), "{text:?}");
                    assert!(err.location().is_some(), "{text:?}");
                }
            }
            let _ = parse(&sample[..i], ConfigFormat::Jsonc);
        }
    }

    #[test]
    fn test_serialize_json_uses_tabs() {
        let value = json!({"a": [1]});
        assert_eq!(
            serialize(value.as_object().unwrap(), ConfigFormat::Json).unwrap(),
            "{\n\t\"a\": [\n\t\t1\n\t]\n}"
        );
    }

    #[test]
    fn test_empty_jsonc_is_empty_object() {
        let parsed = parse("// nothing here\n", ConfigFormat::Jsonc).unwrap();
        assert!(parsed.value.is_empty());
    }
}
