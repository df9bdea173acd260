//! Code-based configs (`cf.config.js`, `cf.config.ts`, ...).
//!
//! The config file is bundled into a temporary module under
//! `<config dir>/.wrangler/tmp/`, imported, and its default export resolved:
//! a function is called with `{ env }`, an object is used as is. In watch
//! mode every rebuild is reloaded and only the newest load is delivered.

pub mod bundler;
pub mod loader;
pub mod runtime;
pub mod watch;

pub use bundler::{BuildReport, BundleWatcher, Bundler, EsbuildBundler};
pub use loader::{ProgrammaticLoader, WorkerConfig};
pub use runtime::{ConfigFunction, DefaultExport, ModuleRuntime, NodeRuntime};
pub use watch::WatchSession;
