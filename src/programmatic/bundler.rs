//! Bundling a code-based config into a single importable module.

use crate::error::LoadError;
use async_trait::async_trait;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A running incremental build. One report is sent per completed build,
/// starting with the initial one.
pub struct BundleWatcher {
    pub reports: mpsc::Receiver<BuildReport>,
    /// Cancelling stops the rebuild loop
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle `entry` into `outfile` once.
    async fn build(&self, entry: &Path, outfile: &Path) -> Result<BuildReport, LoadError>;

    /// Bundle `entry` into `outfile` and rebuild on every change.
    async fn watch(&self, entry: &Path, outfile: &Path) -> Result<BundleWatcher, LoadError>;
}

/// Runs the `esbuild` executable.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    executable: PathBuf,
    debounce: Duration,
}

impl EsbuildBundler {
    pub fn new(executable: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            executable: executable.into(),
            debounce,
        }
    }

    fn command(&self, entry: &Path, outfile: &Path) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg(entry)
            .arg("--bundle")
            .arg("--platform=node")
            .arg("--format=esm")
            .arg("--packages=external")
            .arg("--log-level=warning")
            .arg("--color=false")
            .arg(format!("--outfile={}", outfile.display()))
            .kill_on_drop(true);
        if let Some(dir) = entry.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn build(&self, entry: &Path, outfile: &Path) -> Result<BuildReport, LoadError> {
        debug!(entry = %entry.display(), outfile = %outfile.display(), "bundling config");
        let output = self
            .command(entry, outfile)
            .output()
            .await
            .map_err(|source| LoadError::BundlerUnavailable {
                path: entry.to_path_buf(),
                source,
            })?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(parse_build_log(&stderr, output.status.success()))
    }

    async fn watch(&self, entry: &Path, outfile: &Path) -> Result<BundleWatcher, LoadError> {
        let root = entry
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let ignored = outfile.parent().map(Path::to_path_buf);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            let _ = event_tx.send(result);
        })
        .map_err(|e| watch_error(entry, e))?;
        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| watch_error(entry, e))?;
        info!(root = %root.display(), "watching config sources");

        let (report_tx, reports) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let bundler = self.clone();
        let entry = entry.to_path_buf();
        let outfile = outfile.to_path_buf();

        tokio::spawn(async move {
            let _debouncer = debouncer;
            if report_tx
                .send(build_reporting_errors(&bundler, &entry, &outfile).await)
                .await
                .is_err()
            {
                return;
            }
            loop {
                let events = tokio::select! {
                    _ = token.cancelled() => break,
                    events = event_rx.recv() => match events {
                        Some(events) => events,
                        None => break,
                    },
                };
                let relevant = match events {
                    Ok(events) => events.iter().any(|event| {
                        matches!(
                            event.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        ) && !ignored
                                .as_deref()
                                .is_some_and(|dir| event.path.starts_with(dir))
                    }),
                    Err(e) => {
                        warn!("File watcher error: {}", e);
                        false
                    }
                };
                if !relevant {
                    continue;
                }
                debug!(entry = %entry.display(), "config sources changed, rebuilding");
                let report = build_reporting_errors(&bundler, &entry, &outfile).await;
                if report_tx.send(report).await.is_err() {
                    break;
                }
            }
            debug!(entry = %entry.display(), "config watcher stopped");
        });

        Ok(BundleWatcher { reports, cancel })
    }
}

async fn build_reporting_errors(
    bundler: &EsbuildBundler,
    entry: &Path,
    outfile: &Path,
) -> BuildReport {
    match bundler.build(entry, outfile).await {
        Ok(report) => report,
        Err(e) => BuildReport {
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}

fn watch_error(entry: &Path, error: notify::Error) -> LoadError {
    LoadError::BundlerUnavailable {
        path: entry.to_path_buf(),
        source: std::io::Error::other(error),
    }
}

/// Split esbuild's log output into errors and warnings.
///
/// Messages start with a `✘ [ERROR]` or `▲ [WARNING]` line and run until the
/// next message. A failed build with no recognizable message reports the
/// whole log as one error.
pub fn parse_build_log(log: &str, success: bool) -> BuildReport {
    let mut report = BuildReport::default();
    let mut current: Option<(bool, String)> = None;

    for line in log.lines() {
        let trimmed = line.trim_start();
        let starts = if trimmed.contains("[ERROR]") {
            Some(true)
        } else if trimmed.contains("[WARNING]") {
            Some(false)
        } else {
            None
        };
        if let Some(is_error) = starts {
            flush_message(current.take(), &mut report);
            let message = trimmed
                .split_once(']')
                .map(|(_, rest)| rest.trim())
                .unwrap_or(trimmed);
            current = Some((is_error, message.to_string()));
        } else if let Some((_, text)) = current.as_mut() {
            text.push('\n');
            text.push_str(line);
        }
    }
    flush_message(current.take(), &mut report);

    if !success && report.errors.is_empty() {
        let text = log.trim();
        report.errors.push(if text.is_empty() {
            "bundler exited with an error".to_string()
        } else {
            text.to_string()
        });
    }
    report
}

fn flush_message(message: Option<(bool, String)>, report: &mut BuildReport) {
    if let Some((is_error, text)) = message {
        let text = text.trim_end().to_string();
        if is_error {
            report.errors.push(text);
        } else {
            report.warnings.push(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_log_messages() {
        let log = "✘ [ERROR] Could not resolve \"./missing\"\n\n    cf.config.ts:1:7:\n\
                   ▲ [WARNING] Duplicate key \"name\"\n";
        let report = parse_build_log(log, false);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Could not resolve \"./missing\""));
        assert!(report.errors[0].contains("cf.config.ts:1:7:"));
        assert_eq!(report.warnings, vec!["Duplicate key \"name\""]);
        assert!(!report.succeeded());
    }

    #[test]
    fn test_failure_without_messages() {
        let report = parse_build_log("", false);
        assert_eq!(report.errors, vec!["bundler exited with an error"]);
        assert!(parse_build_log("", true).succeeded());
    }

    #[tokio::test]
    async fn test_missing_executable_is_reported() {
        let bundler = EsbuildBundler::new("/definitely/not/esbuild", Duration::from_millis(10));
        let err = bundler
            .build(Path::new("cf.config.ts"), Path::new("out.mjs"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::BundlerUnavailable { .. }));
    }
}
