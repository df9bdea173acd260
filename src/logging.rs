//! Log output for the command-line tool.
//!
//! Library code only emits `tracing` events; the binary installs a subscriber
//! once, writing to stdout, stderr or a file. `WRANGLER_CONFIG_LOG` takes
//! `EnvFilter` directives and overrides the level chosen by `--verbose`.

use crate::config::settings::ENV_LOG;
use crate::vars::EnvVars;
use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Off,
    Stdout,
    Stderr,
    /// Appended to this file
    File(PathBuf),
}

impl FromStr for LogSink {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "off" => Ok(LogSink::Off),
            "1" | "stdout" => Ok(LogSink::Stdout),
            "2" | "stderr" => Ok(LogSink::Stderr),
            "" => Err("log destination must not be empty".to_string()),
            filename => Ok(LogSink::File(PathBuf::from(filename))),
        }
    }
}

/// Filter from `--verbose`, overridden by `WRANGLER_CONFIG_LOG` when set.
pub fn build_filter(verbose: bool, vars: &dyn EnvVars) -> EnvFilter {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(vars.get(ENV_LOG).unwrap_or_default())
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(sink: &LogSink, verbose: bool, vars: &dyn EnvVars) -> Result<()> {
    let filter = build_filter(verbose, vars);
    match sink {
        LogSink::Off => Ok(()),
        LogSink::Stdout => install(filter, std::io::stdout, true),
        LogSink::Stderr => install(filter, std::io::stderr, true),
        LogSink::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            install(filter, file, false)
        }
    }
}

fn install<W>(filter: EnvFilter, writer: W, ansi: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::fixed_env;

    #[test]
    fn test_sink_parsing() {
        assert_eq!("0".parse::<LogSink>().unwrap(), LogSink::Off);
        assert_eq!("stdout".parse::<LogSink>().unwrap(), LogSink::Stdout);
        assert_eq!("2".parse::<LogSink>().unwrap(), LogSink::Stderr);
        assert_eq!(
            "wrangler-config.log".parse::<LogSink>().unwrap(),
            LogSink::File(PathBuf::from("wrangler-config.log"))
        );
        assert!("".parse::<LogSink>().is_err());
    }

    #[test]
    fn test_filter_defaults_to_verbosity() {
        let vars = fixed_env(Vec::<(String, String)>::new());
        assert_eq!(build_filter(false, &vars).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(build_filter(true, &vars).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_env_directives_override() {
        let vars = fixed_env([(ENV_LOG, "warn")]);
        assert_eq!(build_filter(true, &vars).max_level_hint(), Some(LevelFilter::WARN));
    }
}
