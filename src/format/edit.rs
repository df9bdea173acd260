//! Minimal text edits against a JSONC document.

use super::tree::{Node, NodeKind, ParseOptions, PathSegment, display_path, find_node, parse_tree};
use serde_json::{Map, Value};
use std::fmt;

/// Replace `length` bytes at `offset` with `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub length: usize,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModifyOptions {
    /// Insert at an array index instead of overwriting the element there.
    pub is_array_insertion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for EditError {}

/// Compute the edits that set (or with `None`, remove) the value at `path`.
///
/// Missing parents are created by wrapping the value in objects or arrays
/// until an existing container is reached. The new text is compact; run the
/// formatter afterwards to normalize whitespace.
pub fn set_value(
    text: &str,
    path: &[PathSegment],
    value: Option<&Value>,
    options: ModifyOptions,
) -> Result<Vec<Edit>, EditError> {
    let fail = |message: String| EditError {
        path: display_path(path),
        message,
    };
    let root = parse_tree(text, ParseOptions::JSONC)
        .map_err(|e| fail(format!("document does not parse ({})", e.kind)))?;

    let mut value = value.cloned();
    let mut remaining = path.to_vec();
    let mut last = None;
    let mut parent = None;
    while let Some(segment) = remaining.pop() {
        let found = root.as_ref().and_then(|r| find_node(r, &remaining));
        match (found, value.take()) {
            (None, Some(v)) => {
                value = Some(match &segment {
                    PathSegment::Key(key) => {
                        let mut map = Map::new();
                        map.insert(key.clone(), v);
                        Value::Object(map)
                    }
                    PathSegment::Index(_) | PathSegment::Append => Value::Array(vec![v]),
                });
                last = Some(segment);
            }
            (found, v) => {
                value = v;
                parent = found;
                last = Some(segment);
                break;
            }
        }
    }

    let Some(parent) = parent else {
        let Some(value) = value else {
            if root.is_none() {
                return Err(fail("cannot delete in an empty document".to_string()));
            }
            return Ok(Vec::new());
        };
        let (offset, length) = root.as_ref().map(|r| (r.offset, r.length)).unwrap_or((0, 0));
        return Ok(vec![Edit {
            offset,
            length,
            content: stringify(&value),
        }]);
    };

    match (parent.kind, last) {
        (NodeKind::Object, Some(PathSegment::Key(key))) => {
            Ok(set_property(parent, &key, value.as_ref()))
        }
        (NodeKind::Array, Some(PathSegment::Append)) => match value {
            Some(value) => Ok(vec![append_element(parent, &value)]),
            None => Ok(Vec::new()),
        },
        (NodeKind::Array, Some(PathSegment::Index(index))) => match value {
            Some(value) => Ok(vec![set_element(parent, index, &value, options)]),
            None => remove_element(parent, index)
                .map(|edit| vec![edit])
                .ok_or_else(|| fail(format!("array index {index} is out of bounds"))),
        },
        (kind, segment) => Err(fail(format!(
            "cannot set {} on a value of type {:?}",
            match segment {
                Some(PathSegment::Key(_)) => "a property",
                _ => "an index",
            },
            kind
        ))),
    }
}

fn stringify(value: &Value) -> String {
    // serializing a Value is infallible
    serde_json::to_string(value).unwrap_or_default()
}

fn set_property(parent: &Node, key: &str, value: Option<&Value>) -> Vec<Edit> {
    let index = parent.children.iter().position(|p| p.key() == Some(key));
    match (index, value) {
        (Some(index), None) => {
            let property = &parent.children[index];
            let mut remove_end = property.end();
            let remove_begin = if index > 0 {
                parent.children[index - 1].end()
            } else {
                if let Some(next) = parent.children.get(1) {
                    remove_end = next.offset;
                }
                parent.offset + 1
            };
            vec![Edit {
                offset: remove_begin,
                length: remove_end - remove_begin,
                content: String::new(),
            }]
        }
        (Some(index), Some(value)) => {
            let Some(existing) = parent.children[index].property_value() else {
                return Vec::new();
            };
            vec![Edit {
                offset: existing.offset,
                length: existing.length,
                content: stringify(value),
            }]
        }
        (None, None) => Vec::new(),
        (None, Some(value)) => {
            let property = format!("{}: {}", stringify(&Value::String(key.to_string())), stringify(value));
            let edit = match parent.children.last() {
                Some(previous) => Edit {
                    offset: previous.end(),
                    length: 0,
                    content: format!(",{property}"),
                },
                None => Edit {
                    offset: parent.offset + 1,
                    length: 0,
                    content: property,
                },
            };
            vec![edit]
        }
    }
}

fn append_element(parent: &Node, value: &Value) -> Edit {
    match parent.children.last() {
        Some(previous) => Edit {
            offset: previous.end(),
            length: 0,
            content: format!(",{}", stringify(value)),
        },
        None => Edit {
            offset: parent.offset + 1,
            length: 0,
            content: stringify(value),
        },
    }
}

fn set_element(parent: &Node, index: usize, value: &Value, options: ModifyOptions) -> Edit {
    let len = parent.children.len();
    let content = stringify(value);
    if !options.is_array_insertion && index < len {
        let existing = &parent.children[index];
        return Edit {
            offset: existing.offset,
            length: existing.length,
            content,
        };
    }
    if len == 0 || index == 0 {
        let content = if len == 0 { content } else { format!("{content},") };
        return Edit {
            offset: parent.offset + 1,
            length: 0,
            content,
        };
    }
    let previous = &parent.children[index.min(len) - 1];
    Edit {
        offset: previous.end(),
        length: 0,
        content: format!(",{content}"),
    }
}

fn remove_element(parent: &Node, index: usize) -> Option<Edit> {
    let len = parent.children.len();
    let target = parent.children.get(index)?;
    let (offset, end) = if len == 1 {
        (parent.offset + 1, parent.end() - 1)
    } else if index == len - 1 {
        (parent.children[index - 1].end(), target.end())
    } else {
        (target.offset, parent.children[index + 1].offset)
    };
    Some(Edit {
        offset,
        length: end - offset,
        content: String::new(),
    })
}

/// Apply a single edit.
pub fn apply_edit(text: &str, edit: &Edit) -> String {
    let mut out = String::with_capacity(text.len() + edit.content.len());
    out.push_str(&text[..edit.offset]);
    out.push_str(&edit.content);
    out.push_str(&text[edit.offset + edit.length..]);
    out
}

/// Apply edits computed against the same text, back to front.
pub fn apply_edits(text: &str, edits: &[Edit]) -> Result<String, EditError> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.length.cmp(&b.length)));
    let mut out = text.to_string();
    let mut last_modified = text.len();
    for edit in sorted.into_iter().rev() {
        if edit.offset + edit.length > last_modified {
            return Err(EditError {
                path: String::new(),
                message: format!("overlapping edit at offset {}", edit.offset),
            });
        }
        out = apply_edit(&out, edit);
        last_modified = edit.offset;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn modify(text: &str, path: &[PathSegment], value: Option<Value>, insertion: bool) -> String {
        let edits = set_value(
            text,
            path,
            value.as_ref(),
            ModifyOptions {
                is_array_insertion: insertion,
            },
        )
        .unwrap();
        apply_edits(text, &edits).unwrap()
    }

    fn key(k: &str) -> PathSegment {
        PathSegment::from(k)
    }

    #[test]
    fn test_insert_into_empty_object() {
        assert_eq!(
            modify("{}", &[key("a")], Some(json!(1)), false),
            r#"{"a": 1}"#
        );
    }

    #[test]
    fn test_insert_after_last_property() {
        assert_eq!(
            modify(r#"{"a": 1 }"#, &[key("b")], Some(json!("x")), false),
            r#"{"a": 1,"b": "x" }"#
        );
    }

    #[test]
    fn test_missing_parents_are_created() {
        assert_eq!(
            modify("{}", &[key("kv"), PathSegment::Append], Some(json!({"binding": "KV"})), true),
            r#"{"kv": [{"binding":"KV"}]}"#
        );
        assert_eq!(
            modify("{}", &[key("a"), key("b")], Some(json!(true)), false),
            r#"{"a": {"b":true}}"#
        );
    }

    #[test]
    fn test_replace_existing_value() {
        assert_eq!(
            modify(r#"{"a": [1, 2]}"#, &[key("a")], Some(json!("z")), false),
            r#"{"a": "z"}"#
        );
    }

    #[test]
    fn test_remove_properties() {
        assert_eq!(modify(r#"{"a": 1, "b": 2}"#, &[key("a")], None, false), r#"{"b": 2}"#);
        assert_eq!(modify(r#"{"a": 1, "b": 2}"#, &[key("b")], None, false), r#"{"a": 1}"#);
        assert_eq!(modify(r#"{"a": 1}"#, &[key("a")], None, false), "{}");
        assert_eq!(modify(r#"{"a": 1}"#, &[key("zzz")], None, false), r#"{"a": 1}"#);
    }

    #[test]
    fn test_array_append_and_index() {
        let path = [key("a"), PathSegment::Append];
        assert_eq!(modify(r#"{"a": []}"#, &path, Some(json!(1)), true), r#"{"a": [1]}"#);
        assert_eq!(modify(r#"{"a": [1]}"#, &path, Some(json!(2)), true), r#"{"a": [1,2]}"#);

        let at = |i| [key("a"), PathSegment::Index(i)];
        assert_eq!(modify(r#"{"a": [1, 2]}"#, &at(1), Some(json!(9)), false), r#"{"a": [1, 9]}"#);
        assert_eq!(modify(r#"{"a": [1, 2]}"#, &at(0), Some(json!(9)), true), r#"{"a": [9,1, 2]}"#);
        assert_eq!(modify(r#"{"a": [1, 2]}"#, &at(7), Some(json!(9)), false), r#"{"a": [1, 2,9]}"#);
    }

    #[test]
    fn test_array_removal() {
        let at = |i| [key("a"), PathSegment::Index(i)];
        assert_eq!(modify(r#"{"a": [1]}"#, &at(0), None, false), r#"{"a": []}"#);
        assert_eq!(modify(r#"{"a": [1, 2, 3]}"#, &at(0), None, false), r#"{"a": [2, 3]}"#);
        assert_eq!(modify(r#"{"a": [1, 2, 3]}"#, &at(2), None, false), r#"{"a": [1, 2]}"#);
    }

    #[test]
    fn test_setting_property_on_scalar_fails() {
        let err = set_value(r#"{"a": 1}"#, &[key("a"), key("b")], Some(&json!(1)), ModifyOptions::default())
            .unwrap_err();
        assert_eq!(err.path, "a.b");
    }

    #[test]
    fn test_empty_document_takes_whole_value() {
        assert_eq!(modify("", &[key("a")], Some(json!(1)), false), r#"{"a":1}"#);
    }

    #[test]
    fn test_overlapping_edits_are_rejected() {
        let edits = vec![
            Edit { offset: 0, length: 3, content: "x".into() },
            Edit { offset: 2, length: 1, content: "y".into() },
        ];
        assert!(apply_edits("abcd", &edits).is_err());
    }
}
