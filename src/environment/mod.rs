//! Environment resolution: validating a raw config and resolving every field
//! for a target environment.
//!
//! Inheritable fields fall back from a named environment to the top level.
//! Non-inheritable fields (bindings, vars) must be restated per environment and
//! produce a warning when only the top level sets them. Problems are collected
//! as [`Diagnostics`] rather than returned as errors.

pub mod diagnostics;
pub mod inherit;
pub mod normalize;
pub mod validators;

use serde_json::{Map, Value};

/// A resolved environment: field name to normalized value.
pub type Environment = Map<String, Value>;

pub use diagnostics::Diagnostics;
pub use inherit::{EnvScope, ScopeKind};
pub use normalize::{Config, NormalizeArgs, normalize_and_validate_config};
