//! Field validators.
//!
//! A validator inspects one raw field value (`None` when the field is absent),
//! records problems into [`Diagnostics`] and returns whether the value is
//! acceptable. The last argument is the resolved top-level environment when a
//! named environment is being validated.

use super::Environment;
use super::diagnostics::Diagnostics;
use crate::config::settings::ENV_DISABLE_EXPERIMENTAL_WARNING;
use crate::vars::EnvVars;
use chrono::{DateTime, NaiveDate};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

pub type Validate<'a> =
    dyn Fn(&mut Diagnostics, &str, Option<&Value>, Option<&Environment>) -> bool + 'a;

pub type ValidatorFn<'a> = Box<Validate<'a>>;

/// JSON rendering used in messages; absent values print as `undefined`.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(v) => serde_json::to_string(v).unwrap_or_default(),
    }
}

/// JavaScript-style type name of a value.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
    }
}

fn is_record(value: &Value) -> bool {
    value.is_object()
}

/// Join as an English list: `a`, `a and b`, `a, b, and c`.
pub fn english_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] => format!("{a} and {b}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

fn lookup<'v>(config: &'v Map<String, Value>, field_path: &str) -> Option<&'v Value> {
    let mut parts = field_path.split('.');
    let first = parts.next()?;
    let mut value = config.get(first)?;
    for part in parts {
        value = value.as_object()?.get(part)?;
    }
    Some(value)
}

/// Record a deprecation when `field_path` (dot separated) is present.
///
/// Returns whether the field was found; callers that drop deprecated fields
/// remove it from their own copy.
pub fn deprecated(
    diagnostics: &mut Diagnostics,
    config: &Map<String, Value>,
    field_path: &str,
    message: &str,
    title: &str,
    severity: Severity,
) -> bool {
    if lookup(config, field_path).is_none() {
        return false;
    }
    let text = format!("{title}: \"{field_path}\":\n{message}");
    match severity {
        Severity::Warning => diagnostics.warn(text),
        Severity::Error => diagnostics.error(text),
    }
    true
}

/// Warn when an experimental field is present, unless suppressed through
/// `WRANGLER_DISABLE_EXPERIMENTAL_WARNING`.
pub fn experimental(
    diagnostics: &mut Diagnostics,
    config: &Map<String, Value>,
    field_path: &str,
    env: &dyn EnvVars,
) {
    if lookup(config, field_path).is_some() && env.get(ENV_DISABLE_EXPERIMENTAL_WARNING).is_none() {
        diagnostics.warn(format!(
            "\"{field_path}\" fields are experimental and may change or break at any time."
        ));
    }
}

pub fn is_string(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    match value {
        Some(v) if !v.is_string() => {
            d.error(format!(
                "Expected \"{field}\" to be of type string but got {}.",
                stringify(value)
            ));
            false
        }
        _ => true,
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^$|^[a-z0-9_][a-z0-9-_]*$").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

/// Worker names: lowercase alphanumerics, dashes and underscores.
pub fn is_valid_name(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    match value {
        None => true,
        Some(Value::String(s)) if name_pattern().is_match(s) => true,
        Some(_) => {
            d.error(format!(
                "Expected \"{field}\" to be of type string, alphanumeric and lowercase with dashes only but got {}.",
                stringify(value)
            ));
            false
        }
    }
}

pub fn is_boolean(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    match value {
        Some(v) if !v.is_boolean() => {
            d.error(format!(
                "Expected \"{field}\" to be of type boolean but got {}.",
                stringify(value)
            ));
            false
        }
        _ => true,
    }
}

pub fn is_string_array(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    let Some(v) = value else {
        return true;
    };
    let ok = v
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string));
    if !ok {
        d.error(format!(
            "Expected \"{field}\" to be of type string array but got {}.",
            stringify(value)
        ));
    }
    ok
}

/// A date in `YYYY-MM-DD` form (a full RFC 3339 timestamp is also accepted).
pub fn is_compatibility_date(
    d: &mut Diagnostics,
    field: &str,
    value: Option<&Value>,
    _: Option<&Environment>,
) -> bool {
    let Some(Value::String(raw)) = value else {
        return true;
    };
    let mut valid = true;
    if raw.contains('\u{2013}') || raw.contains('\u{2014}') {
        d.error(format!(
            "\"{field}\" field should use ISO-8601 accepted hyphens (-) rather than en-dashes (\u{2013}) or em-dashes (\u{2014})."
        ));
        valid = false;
    }
    let normalized = raw.replace(['\u{2013}', '\u{2014}'], "-");
    let parses = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(&normalized).is_ok();
    if !parses {
        d.error(format!(
            "\"{field}\" field should be a valid ISO-8601 date (YYYY-MM-DD), but got {}.",
            stringify(value)
        ));
        valid = false;
    }
    valid
}

pub fn is_one_of<'a>(choices: Vec<Value>) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>| {
            match value {
                Some(v) if !choices.contains(v) => {
                    d.error(format!(
                        "Expected \"{field}\" field to be one of {} but got {}.",
                        stringify(Some(&Value::Array(choices.clone()))),
                        stringify(value)
                    ));
                    false
                }
                _ => true,
            }
        },
    )
}

/// An object that has every one of `properties`; other keys are warned about.
pub fn is_object_with<'a>(properties: &'a [&'a str]) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>| {
            let Some(v) = value else {
                return true;
            };
            let Some(map) = v.as_object().filter(|m| properties.iter().all(|p| m.contains_key(*p)))
            else {
                d.error(format!(
                    "Expected \"{field}\" to be of type object, containing only properties {}, but got {}.",
                    properties.join(","),
                    stringify(value)
                ));
                return false;
            };
            let rest: Vec<&str> = map
                .keys()
                .map(String::as_str)
                .filter(|k| !properties.contains(k))
                .collect();
            validate_additional_properties(d, field, &rest, &[]);
            true
        },
    )
}

/// Fails when the field and any of `fields` are both set in `container`.
pub fn is_mutually_exclusive_with<'a>(
    container: &'a Map<String, Value>,
    fields: &'a [&'a str],
) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>| {
            if value.is_none() {
                return true;
            }
            if fields.iter().any(|other| container.contains_key(*other)) {
                let mut names = vec![field];
                names.extend(fields.iter().copied());
                d.error(format!(
                    "Expected exactly one of the following fields {}.",
                    serde_json::to_string(&names).unwrap_or_default()
                ));
                return false;
            }
            true
        },
    )
}

/// Run every validator, reporting all problems.
pub fn all<'a>(validators: Vec<ValidatorFn<'a>>) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, top: Option<&Environment>| {
            let mut passed = true;
            for validate in &validators {
                if !validate(d, field, value, top) {
                    passed = false;
                }
            }
            passed
        },
    )
}

/// Warn about keys outside `known`.
pub fn validate_additional_properties(
    d: &mut Diagnostics,
    field_path: &str,
    rest: &[&str],
    known: &[&str],
) -> bool {
    let mut seen = HashSet::new();
    let unexpected: Vec<String> = rest
        .iter()
        .filter(|k| !known.contains(k) && seen.insert(**k))
        .map(|k| format!("\"{k}\""))
        .collect();
    if unexpected.is_empty() {
        return true;
    }
    d.warn(format!(
        "Unexpected fields found in {field_path} field: {}",
        unexpected.join(",")
    ));
    false
}

fn qualified(container: &str, key: &str) -> String {
    if container.is_empty() {
        key.to_string()
    } else {
        format!("{container}.{key}")
    }
}

/// The property must exist and have the given JavaScript type.
pub fn validate_required_property(
    d: &mut Diagnostics,
    container: &str,
    key: &str,
    value: Option<&Value>,
    expected: &str,
) -> bool {
    let path = qualified(container, key);
    match value {
        None => {
            d.error(format!("\"{path}\" is a required field."));
            false
        }
        Some(v) if type_name(v) != expected => {
            d.error(format!(
                "Expected \"{path}\" to be of type {expected} but got {}.",
                stringify(value)
            ));
            false
        }
        _ => true,
    }
}

pub fn validate_optional_property(
    d: &mut Diagnostics,
    container: &str,
    key: &str,
    value: Option<&Value>,
    expected: &str,
) -> bool {
    value.is_none() || validate_required_property(d, container, key, value, expected)
}

pub fn validate_optional_typed_array(
    d: &mut Diagnostics,
    container: &str,
    value: Option<&Value>,
    expected: &str,
) -> bool {
    let Some(v) = value else {
        return true;
    };
    let Some(items) = v.as_array() else {
        d.error(format!(
            "Expected \"{container}\" to be an array of {expected}s but got {}",
            stringify(value)
        ));
        return false;
    };
    let mut valid = true;
    for (i, item) in items.iter().enumerate() {
        valid = validate_required_property(d, container, &format!("[{i}]"), Some(item), expected) && valid;
    }
    valid
}

fn has_type(map: &Map<String, Value>, key: &str, expected: &str) -> bool {
    map.get(key).is_some_and(|v| type_name(v) == expected)
}

fn has_optional_type(map: &Map<String, Value>, key: &str, expected: &str) -> bool {
    map.get(key).is_none_or(|v| type_name(v) == expected)
}

fn is_valid_route_value(item: &Value) -> bool {
    match item {
        Value::String(s) => !s.is_empty(),
        Value::Object(map) => {
            if !has_type(map, "pattern", "string") {
                return false;
            }
            let other_keys = map.len() - 1;
            let has_zone_id = has_type(map, "zone_id", "string");
            let has_zone_name = has_type(map, "zone_name", "string");
            let has_custom_domain = has_type(map, "custom_domain", "boolean");
            (other_keys == 2 && has_custom_domain && (has_zone_id || has_zone_name))
                || (other_keys == 1 && (has_zone_id || has_zone_name || has_custom_domain))
        }
        _ => false,
    }
}

pub fn is_route(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    match value {
        Some(v) if !is_valid_route_value(v) => {
            d.error(format!(
                "Expected \"{field}\" to be either a string, or an object with shape {{ pattern, custom_domain, zone_id | zone_name }}, but got {}.",
                stringify(value)
            ));
            false
        }
        _ => true,
    }
}

pub fn is_route_array(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    let Some(v) = value else {
        return true;
    };
    let Some(items) = v.as_array() else {
        d.error(format!(
            "Expected \"{field}\" to be an array but got {}.",
            stringify(value)
        ));
        return false;
    };
    let invalid: Vec<Value> = items
        .iter()
        .filter(|item| !is_valid_route_value(item))
        .cloned()
        .collect();
    if invalid.is_empty() {
        return true;
    }
    d.error(format!(
        "Expected \"{field}\" to be an array of either strings or objects with the shape {{ pattern, custom_domain, zone_id | zone_name }}, but these weren't valid: {}.",
        serde_json::to_string_pretty(&invalid).unwrap_or_default()
    ));
    false
}

fn env_field_path(env_name: &str, field: &str, top: Option<&Environment>) -> String {
    if top.is_none() {
        field.to_string()
    } else {
        format!("env.{env_name}.{field}")
    }
}

/// `vars`: in a named environment, warn about top-level vars it does not repeat.
pub fn validate_vars<'a>(env_name: &'a str) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, top: Option<&Environment>| {
            let field_path = env_field_path(env_name, field, top);
            let top_vars: Vec<&String> = top
                .and_then(|t| t.get("vars"))
                .and_then(Value::as_object)
                .map(|m| m.keys().collect())
                .unwrap_or_default();
            if top_vars.is_empty() {
                return true;
            }
            let Some(map) = value.and_then(Value::as_object) else {
                d.error(format!(
                    "The field \"{field_path}\" should be an object but got {}.\n",
                    stringify(value)
                ));
                return false;
            };
            for name in top_vars {
                if !map.contains_key(name) {
                    d.warn(format!(
                        "\"vars.{name}\" exists at the top level, but not on \"{field_path}\".\n\
                         This is not what you probably want, since \"vars\" configuration is not inherited by environments.\n\
                         Please add \"vars.{name}\" to \"env.{env_name}\"."
                    ));
                }
            }
            true
        },
    )
}

/// `define`: string values only; named environments may only override
/// top-level keys.
pub fn validate_defines<'a>(env_name: &'a str) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, top: Option<&Environment>| {
            let field_path = env_field_path(env_name, field, top);
            let mut valid = true;
            match value {
                Some(Value::Object(map)) => {
                    for (name, v) in map {
                        if !v.is_string() {
                            d.error(format!(
                                "The field \"{field_path}.{name}\" should be a string but got {}.",
                                stringify(Some(v))
                            ));
                            valid = false;
                        }
                    }
                }
                Some(_) => {
                    d.error(format!(
                        "The field \"{field_path}\" should be an object but got {}.\n",
                        stringify(value)
                    ));
                    valid = false;
                }
                None => {}
            }

            let top_defines: Vec<&String> = top
                .and_then(|t| t.get("define"))
                .and_then(Value::as_object)
                .map(|m| m.keys().collect())
                .unwrap_or_default();
            if let (false, Some(Value::Object(map))) = (top_defines.is_empty(), value) {
                for name in &top_defines {
                    if !map.contains_key(*name) {
                        d.warn(format!(
                            "\"define.{name}\" exists at the top level, but not on \"{field_path}\".\n\
                             This is not what you probably want, since \"define\" configuration is not inherited by environments.\n\
                             Please add \"define.{name}\" to \"env.{env_name}\"."
                        ));
                    }
                }
                for name in map.keys() {
                    if !top_defines.contains(&name) {
                        d.warn(format!(
                            "\"{name}\" exists on \"env.{env_name}\", but not on the top level.\n\
                             This is not what you probably want, since \"define\" configuration within environments can only override existing top level \"define\" configuration\n\
                             Please remove \"{field_path}.{name}\", or add \"define.{name}\"."
                        ));
                    }
                }
            }
            valid
        },
    )
}

/// Names declared by a bindings value: `{bindings: [{name}]}`, `[{binding}]`,
/// `{binding}` or the keys of a plain object.
pub fn binding_names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => {
            if let Some(Value::Array(bindings)) = map.get("bindings")
                && bindings
                    .iter()
                    .all(|b| b.get("name").is_some_and(Value::is_string))
            {
                return bindings
                    .iter()
                    .filter_map(|b| b.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
            }
            if let Some(binding) = map.get("binding").and_then(Value::as_str) {
                return vec![binding.to_string()];
            }
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k.clone())
                .collect()
        }
        Some(Value::Array(items))
            if items
                .iter()
                .all(|e| e.get("binding").is_some_and(Value::is_string)) =>
        {
            items
                .iter()
                .filter_map(|e| e.get("binding").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        }
        _ => Vec::new(),
    }
}

/// `<field>`: an array of bindings, each checked by `validate_binding`.
pub fn validate_binding_array<'a>(
    env_name: &'a str,
    validate_binding: &'a Validate<'a>,
) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, top: Option<&Environment>| {
            let Some(v) = value else {
                return true;
            };
            let field_path = env_field_path(env_name, field, top);
            let Some(items) = v.as_array() else {
                d.error(format!(
                    "The field \"{field_path}\" should be an array but got {}.",
                    stringify(value)
                ));
                return false;
            };
            let mut valid = true;
            for (i, item) in items.iter().enumerate() {
                valid = validate_binding(d, &format!("{field_path}[{i}]"), Some(item), top) && valid;
            }
            if let Some(Value::Array(top_items)) = top.and_then(|t| t.get(field)) {
                let env_names: Vec<Option<&Value>> =
                    items.iter().map(|item| item.get("binding")).collect();
                for top_item in top_items {
                    let name = top_item.get("binding");
                    if !env_names.contains(&name) {
                        let name = name.and_then(Value::as_str).unwrap_or("undefined");
                        d.warn(format!(
                            "There is a {field} binding with name \"{name}\" at the top level, but not on \"env.{env_name}\".\n\
                             This is not what you probably want, since \"{field}\" configuration is not inherited by environments.\n\
                             Please add a binding for \"{name}\" to \"env.{env_name}.{field}.bindings\"."
                        ));
                    }
                }
            }
            valid
        },
    )
}

/// `<field>`: an object with a `bindings` array, as used by Durable Objects.
pub fn validate_bindings_property<'a>(
    env_name: &'a str,
    validate_binding: &'a Validate<'a>,
) -> ValidatorFn<'a> {
    Box::new(
        move |d: &mut Diagnostics, field: &str, value: Option<&Value>, top: Option<&Environment>| {
            let Some(v) = value else {
                return true;
            };
            let field_path = env_field_path(env_name, field, top);
            let mut valid = true;
            match v.as_object() {
                None => {
                    d.error(format!(
                        "The field \"{field_path}\" should be an object but got {}.",
                        stringify(value)
                    ));
                    valid = false;
                }
                Some(map) => match map.get("bindings") {
                    None => {
                        d.error(format!(
                            "The field \"{field_path}\" is missing the required \"bindings\" property."
                        ));
                        valid = false;
                    }
                    Some(Value::Array(bindings)) => {
                        for (i, binding) in bindings.iter().enumerate() {
                            let path = format!("{field_path}.bindings[{i}]");
                            let mut child =
                                Diagnostics::new(format!("\"{path}\": {}", stringify(Some(binding))));
                            valid = validate_binding(&mut child, &path, Some(binding), top) && valid;
                            d.add_child(child);
                        }
                    }
                    Some(other) => {
                        d.error(format!(
                            "The field \"{field_path}.bindings\" should be an array but got {}.",
                            stringify(Some(other))
                        ));
                        valid = false;
                    }
                },
            }

            let top_names = binding_names(top.and_then(|t| t.get(field)));
            if valid && !top_names.is_empty() {
                let env_names: HashSet<String> = binding_names(value).into_iter().collect();
                let missing: Vec<String> = top_names
                    .into_iter()
                    .filter(|n| !env_names.contains(n))
                    .map(|n| format!("- {n}"))
                    .collect();
                if !missing.is_empty() {
                    d.warn(format!(
                        "The following bindings are at the top level, but not on \"env.{env_name}\".\n\
                         This is not what you probably want, since \"{field}\" configuration is not inherited by environments.\n\
                         Please add a binding for each to \"{field_path}.bindings\":\n{}",
                        missing.join("\n")
                    ));
                }
            }
            valid
        },
    )
}

fn require_binding_object<'v>(
    d: &mut Diagnostics,
    kind: &str,
    value: Option<&'v Value>,
) -> Option<&'v Map<String, Value>> {
    let map = value.and_then(Value::as_object);
    if map.is_none() {
        d.error(format!(
            "\"{kind}\" bindings should be objects, but got {}",
            stringify(value)
        ));
    }
    map
}

fn keys(map: &Map<String, Value>) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

pub fn validate_kv_binding(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    let Some(map) = require_binding_object(d, "kv_namespaces", value) else {
        return false;
    };
    let got = stringify(value);
    let mut valid = true;
    if !has_type(map, "binding", "string") {
        d.error(format!("\"{field}\" bindings should have a string \"binding\" field but got {got}."));
        valid = false;
    }
    if !map.get("id").and_then(Value::as_str).is_some_and(|id| !id.is_empty()) {
        d.error(format!("\"{field}\" bindings should have a string \"id\" field but got {got}."));
        valid = false;
    }
    if !has_optional_type(map, "preview_id", "string") {
        d.error(format!(
            "\"{field}\" bindings should, optionally, have a string \"preview_id\" field but got {got}."
        ));
        valid = false;
    }
    validate_additional_properties(d, field, &keys(map), &["binding", "id", "preview_id"]);
    valid
}

pub fn validate_r2_binding(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    let Some(map) = require_binding_object(d, "r2_buckets", value) else {
        return false;
    };
    let got = stringify(value);
    let mut valid = true;
    if !has_type(map, "binding", "string") {
        d.error(format!("\"{field}\" bindings should have a string \"binding\" field but got {got}."));
        valid = false;
    }
    if !map
        .get("bucket_name")
        .and_then(Value::as_str)
        .is_some_and(|b| !b.is_empty())
    {
        d.error(format!(
            "\"{field}\" bindings should have a string \"bucket_name\" field but got {got}."
        ));
        valid = false;
    }
    for optional in ["preview_bucket_name", "jurisdiction"] {
        if !has_optional_type(map, optional, "string") {
            d.error(format!(
                "\"{field}\" bindings should, optionally, have a string \"{optional}\" field but got {got}."
            ));
            valid = false;
        }
    }
    validate_additional_properties(
        d,
        field,
        &keys(map),
        &["binding", "bucket_name", "preview_bucket_name", "jurisdiction"],
    );
    valid
}

pub fn validate_d1_binding(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    let Some(map) = require_binding_object(d, "d1_databases", value) else {
        return false;
    };
    let got = stringify(value);
    let mut valid = true;
    if !has_type(map, "binding", "string") {
        d.error(format!("\"{field}\" bindings should have a string \"binding\" field but got {got}."));
        valid = false;
    }
    if !has_type(map, "database_id", "string") {
        d.error(format!("\"{field}\" bindings must have a \"database_id\" field but got {got}."));
        valid = false;
    }
    if !has_optional_type(map, "preview_database_id", "string") {
        d.error(format!(
            "\"{field}\" bindings should, optionally, have a string \"preview_database_id\" field but got {got}."
        ));
        valid = false;
    }
    validate_additional_properties(
        d,
        field,
        &keys(map),
        &[
            "binding",
            "database_id",
            "database_internal_env",
            "database_name",
            "migrations_dir",
            "migrations_table",
            "preview_database_id",
        ],
    );
    valid
}

pub fn validate_service_binding(
    d: &mut Diagnostics,
    field: &str,
    value: Option<&Value>,
    _: Option<&Environment>,
) -> bool {
    let Some(map) = require_binding_object(d, "services", value) else {
        return false;
    };
    let got = stringify(value);
    let mut valid = true;
    for required in ["binding", "service"] {
        if !has_type(map, required, "string") {
            d.error(format!(
                "\"{field}\" bindings should have a string \"{required}\" field but got {got}."
            ));
            valid = false;
        }
    }
    for optional in ["environment", "entrypoint"] {
        if !has_optional_type(map, optional, "string") {
            d.error(format!(
                "\"{field}\" bindings should have a string \"{optional}\" field but got {got}."
            ));
            valid = false;
        }
    }
    valid
}

pub fn validate_durable_object_binding(
    d: &mut Diagnostics,
    field: &str,
    value: Option<&Value>,
    _: Option<&Environment>,
) -> bool {
    let Some(map) = value.and_then(Value::as_object) else {
        d.error(format!(
            "Expected \"{field}\" to be an object but got {}",
            stringify(value)
        ));
        return false;
    };
    let mut valid = true;
    if !has_type(map, "name", "string") {
        d.error("binding should have a string \"name\" field.");
        valid = false;
    }
    if !has_type(map, "class_name", "string") {
        d.error("binding should have a string \"class_name\" field.");
        valid = false;
    }
    if !has_optional_type(map, "script_name", "string") {
        d.error("the field \"script_name\", when present, should be a string.");
        valid = false;
    }
    if !has_optional_type(map, "environment", "string") {
        d.error("the field \"environment\", when present, should be a string.");
        valid = false;
    }
    if map.contains_key("environment") && !map.contains_key("script_name") {
        d.error("binding should have a \"script_name\" field if \"environment\" is present.");
        valid = false;
    }
    validate_additional_properties(
        d,
        field,
        &keys(map),
        &["class_name", "environment", "name", "script_name"],
    );
    valid
}

fn validate_tail_consumer(d: &mut Diagnostics, field: &str, value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        d.error(format!(
            "\"{field}\" should be an object but got {}.",
            stringify(Some(value))
        ));
        return false;
    };
    validate_required_property(d, field, "service", map.get("service"), "string")
        && validate_optional_property(d, field, "environment", map.get("environment"), "string")
}

pub fn validate_tail_consumers(
    d: &mut Diagnostics,
    field: &str,
    value: Option<&Value>,
    _: Option<&Environment>,
) -> bool {
    let Some(v) = value.filter(|v| is_truthy(v)) else {
        return true;
    };
    let Some(items) = v.as_array() else {
        d.error(format!(
            "Expected \"{field}\" to be an array but got {}.",
            stringify(value)
        ));
        return false;
    };
    let mut valid = true;
    for (i, item) in items.iter().enumerate() {
        valid = validate_tail_consumer(d, &format!("{field}[{i}]"), item) && valid;
    }
    valid
}

pub fn validate_migrations(d: &mut Diagnostics, field: &str, value: Option<&Value>, _: Option<&Environment>) -> bool {
    let empty = Vec::new();
    let migrations = match value {
        None | Some(Value::Null) => &empty,
        Some(Value::Array(items)) => items,
        Some(other) => {
            d.error(format!(
                "The optional \"{field}\" field should be an array, but got {}",
                stringify(Some(other))
            ));
            return false;
        }
    };

    const KNOWN: &[&str] = &[
        "tag",
        "new_classes",
        "new_sqlite_classes",
        "renamed_classes",
        "deleted_classes",
    ];
    let no_fields = Map::new();
    let mut valid = true;
    for (i, migration) in migrations.iter().enumerate() {
        let map = migration.as_object().unwrap_or(&no_fields);
        valid = validate_additional_properties(d, "migrations", &keys(map), KNOWN) && valid;
        valid = validate_required_property(d, &format!("migrations[{i}]"), "tag", map.get("tag"), "string")
            && valid;
        for list in ["new_classes", "new_sqlite_classes"] {
            valid = validate_optional_typed_array(d, &format!("migrations[{i}].{list}"), map.get(list), "string")
                && valid;
        }
        if let Some(renamed) = map.get("renamed_classes") {
            let ok = renamed.as_array().is_some_and(|items| {
                items.iter().all(|c| {
                    c.as_object()
                        .is_some_and(|c| has_type(c, "from", "string") && has_type(c, "to", "string"))
                })
            });
            if !ok {
                d.error(format!(
                    "Expected \"migrations[{i}].renamed_classes\" to be an array of \"{{from: string, to: string}}\" objects but got {}.",
                    stringify(Some(renamed))
                ));
                valid = false;
            }
        }
        valid = validate_optional_typed_array(
            d,
            &format!("migrations[{i}].deleted_classes"),
            map.get("deleted_classes"),
            "string",
        ) && valid;
    }
    valid
}

/// Accepts anything.
pub fn any_value(_: &mut Diagnostics, _: &str, _: Option<&Value>, _: Option<&Environment>) -> bool {
    true
}

/// JavaScript truthiness of a value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
