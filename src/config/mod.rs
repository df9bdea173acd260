//! Finding and reading config files.
//!
//! ## Discovery
//! The nearest `cf.config.*`, `wrangler.json`, `wrangler.jsonc` or
//! `wrangler.toml` at or above the working directory is used, unless a
//! redirect descriptor (`.wrangler/deploy/config.json`) points elsewhere.
//!
//! ## Environment Variables
//! - `WRANGLER_ESBUILD_PATH` - Bundler executable for code-based configs
//! - `WRANGLER_NODE_PATH` - JavaScript runtime for code-based configs
//! - `WRANGLER_CONFIG_WATCH_DEBOUNCE_MS` - Watch mode debounce window
//! - `WRANGLER_CONFIG_LOG` - Log filter directives

pub mod files;
pub mod loader;
pub mod locator;
pub mod settings;

pub use files::read_config_file;
pub use loader::{ConfigLoader, LoadOptions, LoadedConfig};
pub use locator::{ConfigPaths, LocateOptions, find_config, resolve_config_paths};
pub use settings::Settings;
