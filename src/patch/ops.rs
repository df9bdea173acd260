//! Flattening a partial config into individual edit operations.

use crate::format::PathSegment;
use crate::format::tree::display_path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How arrays in a patch are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Every array element is appended after the existing ones
    #[default]
    Additive,
    /// Array elements overwrite the existing element at the same index
    Replacing,
}

impl EditMode {
    pub fn is_array_insertion(self) -> bool {
        matches!(self, EditMode::Additive)
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditMode::Additive => write!(f, "additive"),
            EditMode::Replacing => write!(f, "replacing"),
        }
    }
}

impl std::str::FromStr for EditMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "additive" => Ok(EditMode::Additive),
            "replacing" => Ok(EditMode::Replacing),
            _ => Err(format!(
                "Invalid edit mode '{}'. Valid options: additive, replacing",
                s
            )),
        }
    }
}

/// A partial config tree.
///
/// Objects are merged key by key into the existing document; `Remove`
/// deletes the key it is attached to.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchNode {
    Remove,
    Value(Value),
    Object(Vec<(String, PatchNode)>),
    Array(Vec<PatchNode>),
}

impl PatchNode {
    /// An object node from key/node pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, PatchNode)>) -> Self {
        PatchNode::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for PatchNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                PatchNode::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Array(items) => PatchNode::Array(items.into_iter().map(Into::into).collect()),
            other => PatchNode::Value(other),
        }
    }
}

/// Set (or with `value == None`, remove) the value at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOperation {
    pub path: Vec<PathSegment>,
    pub value: Option<Value>,
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "set {} = {}", display_path(&self.path), value),
            None => write!(f, "remove {}", display_path(&self.path)),
        }
    }
}

/// Flatten `patch` into operations, in document order.
///
/// Only the top level must be an object; a top-level scalar yields nothing.
pub fn flatten(patch: &PatchNode, mode: EditMode) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    if let PatchNode::Object(entries) = patch {
        flatten_object(entries, mode, &mut Vec::new(), &mut operations);
    }
    operations
}

fn flatten_object(
    entries: &[(String, PatchNode)],
    mode: EditMode,
    prefix: &mut Vec<PathSegment>,
    out: &mut Vec<PatchOperation>,
) {
    for (key, node) in entries {
        prefix.push(PathSegment::Key(key.clone()));
        match node {
            PatchNode::Array(items) => flatten_array(items, mode, prefix, out),
            PatchNode::Object(children) => flatten_object(children, mode, prefix, out),
            PatchNode::Value(value) => out.push(PatchOperation {
                path: prefix.clone(),
                value: Some(value.clone()),
            }),
            PatchNode::Remove => out.push(PatchOperation {
                path: prefix.clone(),
                value: None,
            }),
        }
        prefix.pop();
    }
}

fn flatten_array(
    items: &[PatchNode],
    mode: EditMode,
    prefix: &mut Vec<PathSegment>,
    out: &mut Vec<PatchOperation>,
) {
    for (index, item) in items.iter().enumerate() {
        match (mode, item) {
            (EditMode::Additive, PatchNode::Remove) => {}
            (EditMode::Additive, item) => out.push(PatchOperation {
                path: with(prefix, PathSegment::Append),
                value: Some(to_value(item)),
            }),
            (EditMode::Replacing, PatchNode::Object(children)) => {
                prefix.push(PathSegment::Index(index));
                flatten_object(children, mode, prefix, out);
                prefix.pop();
            }
            (EditMode::Replacing, PatchNode::Remove) => out.push(PatchOperation {
                path: with(prefix, PathSegment::Index(index)),
                value: None,
            }),
            (EditMode::Replacing, item) => out.push(PatchOperation {
                path: with(prefix, PathSegment::Index(index)),
                value: Some(to_value(item)),
            }),
        }
    }
}

fn with(prefix: &[PathSegment], last: PathSegment) -> Vec<PathSegment> {
    let mut path = prefix.to_vec();
    path.push(last);
    path
}

/// Plain value of a node; `Remove` entries inside it are dropped.
fn to_value(node: &PatchNode) -> Value {
    match node {
        PatchNode::Remove => Value::Null,
        PatchNode::Value(value) => value.clone(),
        PatchNode::Object(entries) => Value::Object(
            entries
                .iter()
                .filter(|(_, v)| !matches!(v, PatchNode::Remove))
                .map(|(k, v)| (k.clone(), to_value(v)))
                .collect(),
        ),
        PatchNode::Array(items) => Value::Array(
            items
                .iter()
                .filter(|v| !matches!(v, PatchNode::Remove))
                .map(to_value)
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(ops: &[PatchOperation]) -> Vec<String> {
        ops.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_additive_appends_each_element() {
        let patch = PatchNode::from(json!({
            "kv_namespaces": [{"binding": "KV2"}, {"binding": "KV3"}],
            "triggers": {"crons": ["* * * * *"]}
        }));
        let ops = flatten(&patch, EditMode::Additive);
        assert_eq!(
            paths(&ops),
            vec![
                r#"set kv_namespaces[-1] = {"binding":"KV2"}"#,
                r#"set kv_namespaces[-1] = {"binding":"KV3"}"#,
                r#"set triggers.crons[-1] = "* * * * *""#,
            ]
        );
    }

    #[test]
    fn test_replacing_recurses_into_objects_by_index() {
        let patch = PatchNode::from(json!({
            "kv_namespaces": [{"binding": "KV", "id": "1"}],
            "compatibility_flags": ["a", null, ["nested"]]
        }));
        let ops = flatten(&patch, EditMode::Replacing);
        assert_eq!(
            paths(&ops),
            vec![
                r#"set kv_namespaces[0].binding = "KV""#,
                r#"set kv_namespaces[0].id = "1""#,
                r#"set compatibility_flags[0] = "a""#,
                "set compatibility_flags[1] = null",
                r#"set compatibility_flags[2] = ["nested"]"#,
            ]
        );
    }

    #[test]
    fn test_remove_entries() {
        let patch = PatchNode::object([
            ("kv_namespaces", PatchNode::Remove),
            (
                "compatibility_flags",
                PatchNode::Array(vec![PatchNode::Value(json!("a")), PatchNode::Remove]),
            ),
        ]);

        let replacing = flatten(&patch, EditMode::Replacing);
        assert_eq!(
            paths(&replacing),
            vec![
                "remove kv_namespaces",
                r#"set compatibility_flags[0] = "a""#,
                "remove compatibility_flags[1]",
            ]
        );

        let additive = flatten(&patch, EditMode::Additive);
        assert_eq!(
            paths(&additive),
            vec!["remove kv_namespaces", r#"set compatibility_flags[-1] = "a""#]
        );
    }

    #[test]
    fn test_empty_object_produces_nothing() {
        let patch = PatchNode::from(json!({"vars": {}}));
        assert!(flatten(&patch, EditMode::Replacing).is_empty());
        assert!(flatten(&PatchNode::Value(json!(1)), EditMode::Additive).is_empty());
    }

    #[test]
    fn test_edit_mode_parses_lowercase() {
        let mode: EditMode = serde_json::from_str("\"replacing\"").unwrap();
        assert_eq!(mode, EditMode::Replacing);
        assert!(EditMode::default().is_array_insertion());
        assert_eq!("Additive".parse::<EditMode>().unwrap(), EditMode::Additive);
        assert!("merge".parse::<EditMode>().is_err());
    }
}
