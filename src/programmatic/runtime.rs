//! Importing a bundled config module and reading its default export.

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// A default export that is a function. Called with `{ env }`.
#[async_trait]
pub trait ConfigFunction: Send + Sync {
    async fn call(&self, context: Value) -> anyhow::Result<Value>;
}

pub enum DefaultExport {
    Function(Box<dyn ConfigFunction>),
    Value(Value),
    /// Anything else, by JavaScript type name
    Unsupported(String),
}

impl std::fmt::Debug for DefaultExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultExport::Function(_) => write!(f, "Function"),
            DefaultExport::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultExport::Unsupported(kind) => f.debug_tuple("Unsupported").field(kind).finish(),
        }
    }
}

#[async_trait]
pub trait ModuleRuntime: Send + Sync {
    async fn import_default(&self, artifact: &Path) -> anyhow::Result<DefaultExport>;
}

const NODE_SCRIPT: &str = r#"
import { pathToFileURL } from "node:url";
const [artifact, mode, context] = process.argv.slice(1);
const url = pathToFileURL(artifact);
url.searchParams.set("t", Date.now().toString());
const exported = (await import(url.href)).default;
const kindOf = (v) => (v === null ? "null" : Array.isArray(v) ? "array" : typeof v);
let reply;
if (mode === "call") {
  reply = { kind: "value", value: await exported(JSON.parse(context)) };
} else if (typeof exported === "function") {
  reply = { kind: "function" };
} else if (kindOf(exported) === "object") {
  reply = { kind: "value", value: exported };
} else {
  reply = { kind: kindOf(exported) };
}
process.stdout.write(JSON.stringify(reply ?? null));
"#;

#[derive(Debug, Deserialize)]
struct NodeReply {
    kind: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Evaluates artifacts with a `node` executable.
#[derive(Debug, Clone)]
pub struct NodeRuntime {
    node: PathBuf,
}

impl NodeRuntime {
    pub fn new(node: impl Into<PathBuf>) -> Self {
        Self { node: node.into() }
    }

    async fn run(&self, artifact: &Path, mode: &str, context: &Value) -> anyhow::Result<NodeReply> {
        debug!(artifact = %artifact.display(), mode, "evaluating config module");
        let output = Command::new(&self.node)
            .arg("--input-type=module")
            .arg("-e")
            .arg(NODE_SCRIPT)
            .arg(artifact)
            .arg(mode)
            .arg(context.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("could not run {}", self.node.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}:\n{}",
                self.node.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        serde_json::from_slice(&output.stdout).context("unreadable reply from the config module")
    }
}

#[async_trait]
impl ModuleRuntime for NodeRuntime {
    async fn import_default(&self, artifact: &Path) -> anyhow::Result<DefaultExport> {
        let reply = self.run(artifact, "describe", &Value::Null).await?;
        Ok(match reply.kind.as_str() {
            "function" => DefaultExport::Function(Box::new(NodeFunction {
                runtime: self.clone(),
                artifact: artifact.to_path_buf(),
            })),
            "value" => DefaultExport::Value(reply.value.unwrap_or(Value::Null)),
            other => DefaultExport::Unsupported(other.to_string()),
        })
    }
}

struct NodeFunction {
    runtime: NodeRuntime,
    artifact: PathBuf,
}

#[async_trait]
impl ConfigFunction for NodeFunction {
    async fn call(&self, context: Value) -> anyhow::Result<Value> {
        let reply = self.runtime.run(&self.artifact, "call", &context).await?;
        Ok(reply.value.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_node_is_an_error() {
        let runtime = NodeRuntime::new("/definitely/not/node");
        let err = runtime
            .import_default(Path::new("artifact.mjs"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not run"));
    }

    #[test]
    fn test_reply_without_value() {
        let reply: NodeReply = serde_json::from_str(r#"{"kind":"function"}"#).unwrap();
        assert_eq!(reply.kind, "function");
        assert!(reply.value.is_none());
    }
}
