//! Normalization of a raw config into the [`Config`] for one environment.

use super::Environment;
use super::diagnostics::Diagnostics;
use super::inherit::{
    EnvScope, ScopeKind, append_env_name, identity, inheritable,
    inheritable_in_legacy_environments, not_inheritable,
};
use super::validators::{
    Severity, Validate, ValidatorFn, all, any_value, binding_names, deprecated, english_list,
    experimental, is_boolean, is_compatibility_date, is_mutually_exclusive_with, is_object_with,
    is_one_of, is_truthy, is_route, is_route_array, is_string, is_string_array, is_valid_name,
    validate_additional_properties, validate_binding_array, validate_bindings_property,
    validate_d1_binding, validate_defines, validate_durable_object_binding, validate_kv_binding,
    validate_migrations, validate_optional_property, validate_r2_binding,
    validate_service_binding, validate_tail_consumers, validate_vars,
};
use crate::vars::EnvVars;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Fields of a resolved environment, in output order.
pub const ENVIRONMENT_FIELDS: &[&str] = &[
    "account_id",
    "compatibility_date",
    "compatibility_flags",
    "jsx_factory",
    "jsx_fragment",
    "tsconfig",
    "rules",
    "name",
    "main",
    "find_additional_modules",
    "preserve_file_names",
    "base_dir",
    "route",
    "routes",
    "triggers",
    "assets",
    "usage_model",
    "limits",
    "placement",
    "build",
    "workers_dev",
    "vars",
    "define",
    "durable_objects",
    "migrations",
    "kv_namespaces",
    "cloudchamber",
    "send_email",
    "queues",
    "r2_buckets",
    "d1_databases",
    "vectorize",
    "hyperdrive",
    "services",
    "analytics_engine_datasets",
    "dispatch_namespaces",
    "mtls_certificates",
    "tail_consumers",
    "unsafe",
    "browser",
    "ai",
    "pipelines",
    "version_metadata",
    "zone_id",
    "logfwdr",
    "no_bundle",
    "minify",
    "node_compat",
    "first_party_worker",
    "logpush",
    "upload_source_maps",
    "observability",
];

/// Sections that only exist at the top level; carried through as-is.
pub const PROJECT_FIELDS: &[&str] = &[
    "pages_build_output_dir",
    "dev",
    "site",
    "legacy_assets",
    "alias",
    "wasm_modules",
    "text_blobs",
    "data_blobs",
];

/// Known environment fields that are carried through without validation,
/// and which are inherited from the top level.
const INHERITED_PASSTHROUGH: &[&str] = &[
    "tsconfig",
    "rules",
    "assets",
    "limits",
    "placement",
    "build",
    "logfwdr",
    "node_compat",
    "first_party_worker",
    "observability",
];

const UNINHERITED_PASSTHROUGH: &[&str] = &[
    "cloudchamber",
    "send_email",
    "queues",
    "vectorize",
    "hyperdrive",
    "analytics_engine_datasets",
    "dispatch_namespaces",
    "mtls_certificates",
    "unsafe",
    "browser",
    "ai",
    "pipelines",
    "version_metadata",
];

/// Binding kinds whose names must be unique within one Worker.
const UNIQUE_BINDING_KINDS: &[(&str, &str)] = &[
    ("durable_objects", "Durable Object"),
    ("kv_namespaces", "KV Namespace"),
    ("r2_buckets", "R2 Bucket"),
    ("analytics_engine_datasets", "Analytics Engine Dataset"),
    ("text_blobs", "Text Blob"),
    ("browser", "Browser"),
    ("ai", "AI"),
    ("unsafe", "Unsafe"),
    ("vars", "Environment Variable"),
    ("define", "Definition"),
    ("wasm_modules", "WASM Module"),
    ("data_blobs", "Data Blob"),
];

const IGNORED_FIELD_MESSAGE: &str = "Most common features now work out of the box with wrangler, \
     including modules, jsx, typescript, etc. If you need anything more, use a custom build.";

/// Options that come from the command line rather than the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeArgs {
    /// Named environment to resolve
    pub env: Option<String>,
    /// Overrides `legacy_env` from the file
    pub legacy_env: Option<bool>,
    /// Dispatch namespace being deployed to; relaxes worker name rules
    pub dispatch_namespace: Option<String>,
}

/// A validated config resolved for one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    #[serde(rename = "configPath", skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    pub legacy_env: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_metrics: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_vars: Option<bool>,

    /// Resolved environment fields
    #[serde(flatten)]
    pub environment: Environment,

    /// Top-level-only sections such as `dev` and `site`
    #[serde(flatten)]
    pub project: Map<String, Value>,
}

impl Config {
    /// A resolved field, looking at the environment first.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.environment
            .get(field)
            .or_else(|| self.project.get(field))
    }

    pub fn name(&self) -> Option<&str> {
        self.environment.get("name").and_then(Value::as_str)
    }

    pub fn main(&self) -> Option<&str> {
        self.environment.get("main").and_then(Value::as_str)
    }

    pub fn compatibility_date(&self) -> Option<&str> {
        self.environment
            .get("compatibility_date")
            .and_then(Value::as_str)
    }
}

struct Context<'a> {
    config_path: Option<&'a Path>,
    is_dispatch_namespace: bool,
    use_service_environments: bool,
    vars: &'a dyn EnvVars,
}

/// Validate `raw` and resolve it for the environment named in `args`.
///
/// Never fails: every problem is recorded in the returned diagnostics, and a
/// config whose diagnostics contain errors must not be used.
pub fn normalize_and_validate_config(
    raw: &Map<String, Value>,
    config_path: Option<&Path>,
    args: &NormalizeArgs,
    vars: &dyn EnvVars,
) -> (Config, Diagnostics) {
    let mut diagnostics = Diagnostics::new(format!(
        "Processing {} configuration:",
        config_path
            .map(|p| relative_to_cwd(p).display().to_string())
            .unwrap_or_else(|| "wrangler".to_string())
    ));

    let mut raw = raw.clone();
    for (field, message) in [
        (
            "miniflare",
            "Wrangler does not use configuration in the `miniflare` section. \
             Unless you are using Miniflare directly you can remove this section.",
        ),
        ("type", IGNORED_FIELD_MESSAGE),
        ("webpack_config", IGNORED_FIELD_MESSAGE),
    ] {
        if deprecated(&mut diagnostics, &raw, field, message, "Ignored", Severity::Warning) {
            raw.remove(field);
        }
    }

    for (field, expected) in [
        ("legacy_env", "boolean"),
        ("send_metrics", "boolean"),
        ("keep_vars", "boolean"),
        ("pages_build_output_dir", "string"),
        ("$schema", "string"),
    ] {
        validate_optional_property(&mut diagnostics, "", field, raw.get(field), expected);
    }

    let legacy_env = args
        .legacy_env
        .or_else(|| raw.get("legacy_env").and_then(Value::as_bool))
        .unwrap_or(true);
    if !legacy_env {
        diagnostics.warn(
            "Experimental: Service environments are in beta, and their behaviour is guaranteed \
             to change in the future. DO NOT USE IN PRODUCTION.",
        );
    }

    let ctx = Context {
        config_path,
        is_dispatch_namespace: args
            .dispatch_namespace
            .as_deref()
            .is_some_and(|ns| !ns.trim().is_empty()),
        use_service_environments: !legacy_env,
        vars,
    };

    let top_level = normalize_environment(
        &mut diagnostics,
        &ctx,
        ScopeKind::TopLevel,
        "top level",
        Some(&mut raw),
        None,
        None,
    );

    let mut active = None;
    if let Some(env_name) = args.env.as_deref() {
        let mut env_diagnostics =
            Diagnostics::new(format!("\"env.{env_name}\" environment configuration"));
        let configured_envs = raw.get("env").and_then(Value::as_object);
        match configured_envs.and_then(|envs| envs.get(env_name)) {
            Some(section) => {
                debug!(env = env_name, "resolving named environment");
                let mut section = section.as_object().cloned().unwrap_or_default();
                active = Some(normalize_environment(
                    &mut env_diagnostics,
                    &ctx,
                    ScopeKind::Named,
                    env_name,
                    Some(&mut section),
                    Some(&top_level),
                    Some(&raw),
                ));
                diagnostics.add_child(env_diagnostics);
            }
            None => {
                debug!(env = env_name, "environment not defined, using a stand-in");
                active = Some(normalize_environment(
                    &mut env_diagnostics,
                    &ctx,
                    ScopeKind::StandIn,
                    env_name,
                    None,
                    Some(&top_level),
                    Some(&raw),
                ));
                let available = configured_envs
                    .map(|envs| {
                        let names: Vec<&String> = envs.keys().collect();
                        format!(
                            "The available configured environment names are: {}\n",
                            serde_json::to_string(&names).unwrap_or_default()
                        )
                    })
                    .unwrap_or_default();
                let message = format!(
                    "No environment found in configuration with name \"{env_name}\".\n\
                     Before using `--env={env_name}` there should be an equivalent environment section in the configuration.\n\
                     {available}\n\
                     Consider adding an environment configuration section to the wrangler.toml file:\n\
                     ```\n[env.{env_name}]\n```\n"
                );
                if available.is_empty() {
                    diagnostics.warn(message);
                } else {
                    diagnostics.error(message);
                }
            }
        }
    }

    let mut project = Map::new();
    for field in PROJECT_FIELDS {
        if let Some(value) = raw.get(*field).filter(|v| !v.is_null()) {
            project.insert(field.to_string(), value.clone());
        }
    }

    let config = Config {
        config_path: config_path.map(Path::to_path_buf),
        legacy_env,
        send_metrics: raw.get("send_metrics").and_then(Value::as_bool),
        keep_vars: raw.get("keep_vars").and_then(Value::as_bool),
        environment: active.unwrap_or(top_level),
        project,
    };

    validate_bindings_have_unique_names(&mut diagnostics, &config);

    let mut known: Vec<&str> = ENVIRONMENT_FIELDS.to_vec();
    known.extend_from_slice(PROJECT_FIELDS);
    known.extend_from_slice(&["configPath", "legacy_env", "send_metrics", "keep_vars", "env", "$schema"]);
    let keys: Vec<&str> = raw.keys().map(String::as_str).collect();
    validate_additional_properties(&mut diagnostics, "top-level", &keys, &known);

    (config, diagnostics)
}

fn normalize_environment(
    diagnostics: &mut Diagnostics,
    ctx: &Context<'_>,
    kind: ScopeKind,
    env_name: &str,
    raw: Option<&mut Map<String, Value>>,
    top_level: Option<&Environment>,
    raw_config: Option<&Map<String, Value>>,
) -> Environment {
    let raw = raw.map(|raw| {
        prepare_environment(diagnostics, ctx, raw);
        &*raw
    });
    let scope = match (kind, raw) {
        (ScopeKind::TopLevel, Some(raw)) => EnvScope::top_level(raw),
        (ScopeKind::Named, Some(raw)) => EnvScope::named(env_name, raw),
        _ => EnvScope::missing(env_name),
    };
    let d = diagnostics;
    let fields = Resolver {
        top_level,
        raw_config,
        scope,
    };

    let route = fields.inherit(d, "route", &is_route, None);
    let account_id = inheritable_in_legacy_environments(
        d,
        ctx.use_service_environments,
        top_level,
        &scope,
        "account_id",
        &is_string,
        &identity,
        None,
    );
    let empty = Map::new();
    let route_fields: &[&str] = &["route"];
    let routes_checks: Vec<ValidatorFn<'_>> = vec![
        Box::new(is_route_array),
        is_mutually_exclusive_with(raw.unwrap_or(&empty), route_fields),
    ];
    let routes = fields.inherit(d, "routes", &*all(routes_checks), None);
    let workers_dev = fields.inherit(d, "workers_dev", &is_boolean, None);

    let mut env = Environment::new();
    let mut put = |field: &str, value: Option<Value>| {
        if let Some(value) = value {
            env.insert(field.to_string(), value);
        }
    };

    put("account_id", account_id);
    let date_checks: Vec<ValidatorFn<'_>> =
        vec![Box::new(is_string), Box::new(is_compatibility_date)];
    put(
        "compatibility_date",
        fields.inherit(d, "compatibility_date", &*all(date_checks), None),
    );
    put(
        "compatibility_flags",
        fields.inherit(d, "compatibility_flags", &is_string_array, Some(json!([]))),
    );
    put(
        "jsx_factory",
        fields.inherit(d, "jsx_factory", &is_string, Some(json!("React.createElement"))),
    );
    put(
        "jsx_fragment",
        fields.inherit(d, "jsx_fragment", &is_string, Some(json!("React.Fragment"))),
    );

    let name_validator: &Validate<'_> = if ctx.is_dispatch_namespace {
        &is_string
    } else {
        &is_valid_name
    };
    put(
        "name",
        inheritable_in_legacy_environments(
            d,
            ctx.use_service_environments,
            top_level,
            &scope,
            "name",
            name_validator,
            &append_env_name(env_name),
            None,
        ),
    );
    put(
        "main",
        resolve_path_field(ctx.config_path, fields.inherit(d, "main", &is_string, None)),
    );
    put(
        "find_additional_modules",
        fields.inherit(d, "find_additional_modules", &is_boolean, None),
    );
    put(
        "preserve_file_names",
        fields.inherit(d, "preserve_file_names", &is_boolean, None),
    );
    put(
        "base_dir",
        resolve_path_field(ctx.config_path, fields.inherit(d, "base_dir", &is_string, None)),
    );
    put("route", route);
    put("routes", routes);
    let crons: &[&str] = &["crons"];
    put(
        "triggers",
        fields.inherit(d, "triggers", &*is_object_with(crons), Some(json!({"crons": []}))),
    );
    put(
        "usage_model",
        fields.inherit(
            d,
            "usage_model",
            &*is_one_of(vec![json!("bundled"), json!("unbound")]),
            None,
        ),
    );
    put("workers_dev", workers_dev);

    put(
        "vars",
        fields.own(d, "vars", &*validate_vars(env_name), Some(json!({}))),
    );
    put(
        "define",
        fields.own(d, "define", &*validate_defines(env_name), Some(json!({}))),
    );
    put(
        "durable_objects",
        fields.own(
            d,
            "durable_objects",
            &*validate_bindings_property(env_name, &validate_durable_object_binding),
            Some(json!({"bindings": []})),
        ),
    );
    put(
        "migrations",
        fields.inherit(d, "migrations", &validate_migrations, Some(json!([]))),
    );

    let binding_arrays: [(&str, &Validate<'_>); 4] = [
        ("kv_namespaces", &validate_kv_binding),
        ("r2_buckets", &validate_r2_binding),
        ("d1_databases", &validate_d1_binding),
        ("services", &validate_service_binding),
    ];
    for (field, validate_binding) in binding_arrays {
        let validate = validate_binding_array(env_name, validate_binding);
        put(field, fields.own(d, field, &*validate, Some(json!([]))));
    }
    put(
        "tail_consumers",
        fields.own(d, "tail_consumers", &validate_tail_consumers, None),
    );
    put("zone_id", scope.defined("zone_id").cloned());
    for field in ["no_bundle", "minify", "logpush", "upload_source_maps"] {
        put(field, fields.inherit(d, field, &is_boolean, None));
    }

    for &field in INHERITED_PASSTHROUGH {
        put(field, fields.inherit(d, field, &any_value, None));
    }
    for &field in UNINHERITED_PASSTHROUGH {
        put(field, fields.own(d, field, &any_value, None));
    }

    order_fields(&mut env);
    warn_if_durable_objects_have_no_migrations(d, &env);
    env
}

/// The scope being resolved plus what it inherits from.
struct Resolver<'a> {
    top_level: Option<&'a Environment>,
    raw_config: Option<&'a Map<String, Value>>,
    scope: EnvScope<'a>,
}

impl Resolver<'_> {
    fn inherit(
        &self,
        d: &mut Diagnostics,
        field: &str,
        validate: &Validate<'_>,
        default: Option<Value>,
    ) -> Option<Value> {
        inheritable(d, self.top_level, &self.scope, field, validate, default, &identity)
    }

    fn own(
        &self,
        d: &mut Diagnostics,
        field: &str,
        validate: &Validate<'_>,
        default: Option<Value>,
    ) -> Option<Value> {
        not_inheritable(d, self.top_level, self.raw_config, &self.scope, field, validate, default)
    }
}

/// Deprecations and empty-string cleanup on a working copy of a section.
fn prepare_environment(diagnostics: &mut Diagnostics, ctx: &Context<'_>, raw: &mut Map<String, Value>) {
    if deprecated(
        diagnostics,
        raw,
        "kv-namespaces",
        "The \"kv-namespaces\" field is no longer supported, please rename to \"kv_namespaces\"",
        "Deprecation",
        Severity::Warning,
    ) {
        raw.remove("kv-namespaces");
    }
    deprecated(
        diagnostics,
        raw,
        "zone_id",
        "This is unnecessary since we can deduce this from routes directly.",
        "Deprecation",
        Severity::Warning,
    );
    if deprecated(
        diagnostics,
        raw,
        "experimental_services",
        "The \"experimental_services\" field is no longer supported. \
         Simply rename the [experimental_services] field to [services].",
        "Deprecation",
        Severity::Warning,
    ) {
        raw.remove("experimental_services");
    }
    experimental(diagnostics, raw, "unsafe", ctx.vars);

    for field in ["route", "account_id"] {
        if raw.get(field).and_then(Value::as_str) == Some("") {
            diagnostics.warn(format!(
                "The \"{field}\" field in your configuration is an empty string and will be ignored.\n\
                 Please remove the \"{field}\" field from your configuration."
            ));
            raw.remove(field);
        }
    }
}

/// Reorder an environment to match [`ENVIRONMENT_FIELDS`].
fn order_fields(env: &mut Environment) {
    let mut ordered = Environment::new();
    for field in ENVIRONMENT_FIELDS {
        if let Some(value) = env.remove(*field) {
            ordered.insert(field.to_string(), value);
        }
    }
    ordered.append(env);
    *env = ordered;
}

/// String paths are made absolute relative to the config file's directory.
fn resolve_path_field(config_path: Option<&Path>, value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::String(relative)) => {
            let config_dir = config_path
                .and_then(Path::parent)
                .unwrap_or(Path::new(""));
            let resolved = absolute(&config_dir.join(relative));
            Some(Value::String(resolved.display().to_string()))
        }
        other => other,
    }
}

/// Lexically normalized absolute path.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn relative_to_cwd(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| absolute(path).strip_prefix(&cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}

fn validate_bindings_have_unique_names(diagnostics: &mut Diagnostics, config: &Config) -> bool {
    let mut by_name: Vec<(String, Vec<&str>)> = Vec::new();
    for (field, kind) in UNIQUE_BINDING_KINDS {
        for name in binding_names(config.get(field)) {
            match by_name.iter_mut().find(|(n, _)| *n == name) {
                Some((_, kinds)) => kinds.push(kind),
                None => by_name.push((name, vec![kind])),
            }
        }
    }

    let mut has_duplicates = false;
    for (name, kinds) in &by_name {
        if kinds.len() < 2 {
            continue;
        }
        has_duplicates = true;

        let mut distinct: Vec<&str> = Vec::new();
        let mut repeated: Vec<&str> = Vec::new();
        for kind in kinds {
            if distinct.contains(kind) {
                if !repeated.contains(kind) {
                    repeated.push(kind);
                }
            } else {
                distinct.push(kind);
            }
        }

        if distinct.len() > 1 {
            diagnostics.error(format!(
                "{name} assigned to {} bindings.",
                english_list(&distinct)
            ));
        }
        for kind in repeated {
            diagnostics.error(format!("{name} assigned to multiple {kind} bindings."));
        }
    }

    if has_duplicates {
        diagnostics.error(
            "Bindings must have unique names, so that they can all be referenced in the worker.\n\
             Please change your bindings to have unique names.",
        );
    }
    !has_duplicates
}

fn warn_if_durable_objects_have_no_migrations(diagnostics: &mut Diagnostics, env: &Environment) {
    let Some(bindings) = env
        .get("durable_objects")
        .and_then(|d| d.get("bindings"))
        .and_then(Value::as_array)
    else {
        return;
    };
    let exported: Vec<&Value> = bindings
        .iter()
        .filter(|b| !b.get("script_name").is_some_and(is_truthy))
        .collect();
    let no_migrations = env
        .get("migrations")
        .and_then(Value::as_array)
        .is_none_or(Vec::is_empty);
    if exported.is_empty() || !no_migrations {
        return;
    }
    let Some(class_names) = exported
        .iter()
        .map(|b| b.get("class_name").and_then(Value::as_str))
        .collect::<Option<Vec<&str>>>()
    else {
        return;
    };
    let quoted: Vec<String> = class_names.iter().map(|n| format!("\"{n}\"")).collect();
    diagnostics.warn(format!(
        "In wrangler.toml, you have configured [durable_objects] exported by this Worker ({}), \
         but no [migrations] for them. This may not work as expected until you add a [migrations] \
         section to your wrangler.toml. Add this configuration to your wrangler.toml:\n\
         \n\
         \x20 ```\n\
         \x20 [[migrations]]\n\
         \x20 tag = \"v1\" # Should be unique for each entry\n\
         \x20 new_classes = [{}]\n\
         \x20 ```\n\
         \n\
         Refer to https://developers.cloudflare.com/durable-objects/reference/durable-objects-migrations/ for more details.",
        class_names.join(", "),
        quoted.join(", ")
    ));
}
