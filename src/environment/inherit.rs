//! Per-field resolution policies for a target environment.

use super::Environment;
use super::diagnostics::Diagnostics;
use super::validators::Validate;
use serde_json::{Map, Value};

pub type Transform<'a> = dyn Fn(Option<&Value>) -> Option<Value> + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The top level of the config file
    TopLevel,
    /// An `env.<name>` section that exists in the file
    Named,
    /// A requested environment that the file does not define
    StandIn,
}

/// The raw section being resolved, with its name for messages.
#[derive(Debug, Clone, Copy)]
pub struct EnvScope<'a> {
    pub kind: ScopeKind,
    pub name: &'a str,
    raw: Option<&'a Map<String, Value>>,
}

impl<'a> EnvScope<'a> {
    pub fn top_level(raw: &'a Map<String, Value>) -> Self {
        Self {
            kind: ScopeKind::TopLevel,
            name: "top level",
            raw: Some(raw),
        }
    }

    pub fn named(name: &'a str, raw: &'a Map<String, Value>) -> Self {
        Self {
            kind: ScopeKind::Named,
            name,
            raw: Some(raw),
        }
    }

    /// A stand-in for an environment that was requested but not defined. It
    /// has no values of its own, so inheritable fields still go through their
    /// transform.
    pub fn missing(name: &'a str) -> Self {
        Self {
            kind: ScopeKind::StandIn,
            name,
            raw: None,
        }
    }

    /// Raw value, `null` included.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.raw.and_then(|raw| raw.get(field))
    }

    /// Raw value with `null` treated as absent.
    pub fn defined(&self, field: &str) -> Option<&'a Value> {
        self.get(field).filter(|v| !v.is_null())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.raw.is_some_and(|raw| raw.contains_key(field))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.raw.into_iter().flat_map(|raw| raw.keys().map(String::as_str))
    }
}

pub fn identity(value: Option<&Value>) -> Option<Value> {
    value.cloned()
}

/// Transform that turns `name` into `name-<env>`; empty or non-string values
/// become absent.
pub fn append_env_name(env_name: &str) -> impl Fn(Option<&Value>) -> Option<Value> + '_ {
    move |value| match value {
        Some(Value::String(s)) if !s.is_empty() => Some(Value::String(format!("{s}-{env_name}"))),
        _ => None,
    }
}

/// Scope value, else the transformed top-level value, else the default.
pub fn inheritable(
    diagnostics: &mut Diagnostics,
    top_level: Option<&Environment>,
    scope: &EnvScope<'_>,
    field: &str,
    validate: &Validate<'_>,
    default: Option<Value>,
    transform: &Transform<'_>,
) -> Option<Value> {
    validate(diagnostics, field, scope.get(field), top_level);
    scope
        .defined(field)
        .cloned()
        .or_else(|| transform(top_level.and_then(|t| t.get(field)).filter(|v| !v.is_null())))
        .or(default)
}

/// Like [`inheritable`], except that with service environments a named
/// environment may not set the field at all; the top-level value is kept.
#[allow(clippy::too_many_arguments)]
pub fn inheritable_in_legacy_environments(
    diagnostics: &mut Diagnostics,
    use_service_environments: bool,
    top_level: Option<&Environment>,
    scope: &EnvScope<'_>,
    field: &str,
    validate: &Validate<'_>,
    transform: &Transform<'_>,
    default: Option<Value>,
) -> Option<Value> {
    if use_service_environments && let Some(top) = top_level {
        if scope.contains(field) {
            diagnostics.error(format!(
                "The \"{field}\" field is not allowed in named service environments.\n\
                 Please remove the field from this environment."
            ));
        }
        return top.get(field).cloned();
    }
    inheritable(diagnostics, top_level, scope, field, validate, default, transform)
}

/// Scope value or the default. A field set only at the top level is reported,
/// since it does not carry over.
pub fn not_inheritable(
    diagnostics: &mut Diagnostics,
    top_level: Option<&Environment>,
    raw_config: Option<&Map<String, Value>>,
    scope: &EnvScope<'_>,
    field: &str,
    validate: &Validate<'_>,
    default: Option<Value>,
) -> Option<Value> {
    if let Some(value) = scope.get(field) {
        validate(diagnostics, field, Some(value), top_level);
    } else if raw_config.is_some_and(|raw| raw.get(field).is_some()) {
        let env_name = scope.name;
        diagnostics.warn(format!(
            "\"{field}\" exists at the top level, but not on \"env.{env_name}\".\n\
             This is not what you probably want, since \"{field}\" is not inherited by environments.\n\
             Please add \"{field}\" to \"env.{env_name}\"."
        ));
    }
    scope.defined(field).cloned().or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::validators::{any_value, is_string, is_valid_name};
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_named_scope_overrides_top_level() {
        let top = map(json!({"main": "src/index.ts"}));
        let raw = map(json!({"main": "src/staging.ts"}));
        let scope = EnvScope::named("staging", &raw);
        let mut d = Diagnostics::default();
        let value = inheritable(&mut d, Some(&top), &scope, "main", &is_string, None, &identity);
        assert_eq!(value, Some(json!("src/staging.ts")));
    }

    #[test]
    fn test_null_falls_back_to_top_level() {
        let top = map(json!({"jsx_factory": "h"}));
        let raw = map(json!({"jsx_factory": null}));
        let scope = EnvScope::named("staging", &raw);
        let mut d = Diagnostics::default();
        let value = inheritable(
            &mut d,
            Some(&top),
            &scope,
            "jsx_factory",
            &any_value,
            None,
            &identity,
        );
        assert_eq!(value, Some(json!("h")));
    }

    #[test]
    fn test_default_when_nothing_set() {
        let raw = Map::new();
        let scope = EnvScope::top_level(&raw);
        let mut d = Diagnostics::default();
        let value = inheritable(
            &mut d,
            None,
            &scope,
            "jsx_fragment",
            &is_string,
            Some(json!("React.Fragment")),
            &identity,
        );
        assert_eq!(value, Some(json!("React.Fragment")));
    }

    #[test]
    fn test_stand_in_scope_applies_transform() {
        let top = map(json!({"name": "worker"}));
        let scope = EnvScope::missing("dev");
        let mut d = Diagnostics::default();
        let value = inheritable(
            &mut d,
            Some(&top),
            &scope,
            "name",
            &is_valid_name,
            None,
            &append_env_name("dev"),
        );
        assert_eq!(value, Some(json!("worker-dev")));
        assert!(!d.has_errors());
    }

    #[test]
    fn test_service_environments_forbid_override() {
        let top = map(json!({"name": "worker"}));
        let raw = map(json!({"name": "other"}));
        let scope = EnvScope::named("prod", &raw);
        let mut d = Diagnostics::default();
        let value = inheritable_in_legacy_environments(
            &mut d,
            true,
            Some(&top),
            &scope,
            "name",
            &is_valid_name,
            &append_env_name("prod"),
            None,
        );
        assert_eq!(value, Some(json!("worker")));
        assert_eq!(
            d.errors,
            vec![
                "The \"name\" field is not allowed in named service environments.\nPlease remove the field from this environment."
            ]
        );
    }

    #[test]
    fn test_legacy_environments_append_env_name() {
        let top = map(json!({"name": "worker"}));
        let raw = map(json!({}));
        let scope = EnvScope::named("prod", &raw);
        let mut d = Diagnostics::default();
        let value = inheritable_in_legacy_environments(
            &mut d,
            false,
            Some(&top),
            &scope,
            "name",
            &is_valid_name,
            &append_env_name("prod"),
            None,
        );
        assert_eq!(value, Some(json!("worker-prod")));
    }

    #[test]
    fn test_not_inheritable_warns_and_uses_default() {
        let raw_config = map(json!({"vars": {"A": "1"}}));
        let top = raw_config.clone();
        let raw = Map::new();
        let scope = EnvScope::named("staging", &raw);
        let mut d = Diagnostics::default();
        let value = not_inheritable(
            &mut d,
            Some(&top),
            Some(&raw_config),
            &scope,
            "vars",
            &any_value,
            Some(json!({})),
        );
        assert_eq!(value, Some(json!({})));
        assert!(d.errors.is_empty());
        assert_eq!(
            d.warnings,
            vec![
                "\"vars\" exists at the top level, but not on \"env.staging\".\n\
                 This is not what you probably want, since \"vars\" is not inherited by environments.\n\
                 Please add \"vars\" to \"env.staging\"."
            ]
        );
    }

    #[test]
    fn test_append_env_name_ignores_empty() {
        let transform = append_env_name("x");
        assert_eq!(transform(Some(&json!(""))), None);
        assert_eq!(transform(None), None);
        assert_eq!(transform(Some(&json!("a"))), Some(json!("a-x")));
    }
}
