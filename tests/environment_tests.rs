//! Integration tests for environment resolution through the public API.
//!
//! Configs are written to disk and read back through `ConfigLoader` where the
//! file matters; otherwise `normalize_and_validate_config` is called directly.

use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wrangler_config::config::{ConfigLoader, LoadOptions, Settings};
use wrangler_config::environment::{Config, Diagnostics, NormalizeArgs, normalize_and_validate_config};
use wrangler_config::error::{ConfigError, ErrorCode};
use wrangler_config::vars::fixed_env;

fn raw(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn resolve(value: Value, env: Option<&str>) -> (Config, Diagnostics) {
    let args = NormalizeArgs {
        env: env.map(str::to_string),
        ..Default::default()
    };
    normalize_and_validate_config(
        &raw(value),
        Some(Path::new("/project/wrangler.json")),
        &args,
        &HashMap::<String, String>::new(),
    )
}

// ---------------------------------------------------------------------------
// Inheritance
// ---------------------------------------------------------------------------

mod inheritance_tests {
    use super::*;

    #[test]
    fn inheritable_fields_fall_back_to_top_level() {
        let (config, diagnostics) = resolve(
            json!({
                "name": "api",
                "compatibility_date": "2024-05-01",
                "workers_dev": false,
                "compatibility_flags": ["nodejs_compat"],
                "env": {"staging": {}}
            }),
            Some("staging"),
        );
        assert!(!diagnostics.has_errors());
        assert!(!diagnostics.has_warnings());
        assert_eq!(config.compatibility_date(), Some("2024-05-01"));
        assert_eq!(config.get("workers_dev"), Some(&json!(false)));
        assert_eq!(config.get("compatibility_flags"), Some(&json!(["nodejs_compat"])));
        // The name is transformed on the way down.
        assert_eq!(config.name(), Some("api-staging"));
    }

    #[test]
    fn environment_values_override_top_level() {
        let (config, _) = resolve(
            json!({
                "name": "api",
                "compatibility_date": "2024-05-01",
                "env": {"staging": {"name": "api-preview", "compatibility_date": "2024-06-01"}}
            }),
            Some("staging"),
        );
        assert_eq!(config.name(), Some("api-preview"));
        assert_eq!(config.compatibility_date(), Some("2024-06-01"));
    }

    #[test]
    fn non_inheritable_fields_warn_and_use_default() {
        let (config, diagnostics) = resolve(
            json!({
                "name": "api",
                "vars": {"MODE": "prod"},
                "kv_namespaces": [{"binding": "CACHE", "id": "abc"}],
                "env": {"staging": {}}
            }),
            Some("staging"),
        );
        assert!(!diagnostics.has_errors());
        assert_eq!(config.get("vars"), Some(&json!({})));
        assert_eq!(config.get("kv_namespaces"), Some(&json!([])));

        let warnings = diagnostics.render_warnings();
        assert!(warnings.contains("\"vars\" exists at the top level, but not on \"env.staging\"."));
        assert!(warnings.contains("\"kv_namespaces\" exists at the top level, but not on \"env.staging\"."));
    }

    #[test]
    fn non_inheritable_fields_restated_per_environment() {
        let (config, diagnostics) = resolve(
            json!({
                "name": "api",
                "vars": {"MODE": "prod"},
                "env": {"staging": {"vars": {"MODE": "staging"}}}
            }),
            Some("staging"),
        );
        assert!(!diagnostics.has_warnings());
        assert_eq!(config.get("vars"), Some(&json!({"MODE": "staging"})));
    }

    #[test]
    fn top_level_resolution_ignores_environments() {
        let (config, diagnostics) = resolve(
            json!({
                "name": "api",
                "vars": {"MODE": "prod"},
                "env": {"staging": {"name": "other"}}
            }),
            None,
        );
        assert!(!diagnostics.has_warnings());
        assert_eq!(config.name(), Some("api"));
        assert_eq!(config.get("vars"), Some(&json!({"MODE": "prod"})));
    }

    #[test]
    fn errors_in_an_environment_are_grouped_under_it() {
        let (_, diagnostics) = resolve(
            json!({"name": "api", "env": {"staging": {"workers_dev": "yes"}}}),
            Some("staging"),
        );
        assert!(diagnostics.errors.is_empty());
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.children.len(), 1);
        assert!(diagnostics.render_errors().contains("\"workers_dev\""));
    }
}

// ---------------------------------------------------------------------------
// Loader facade
// ---------------------------------------------------------------------------

mod loader_tests {
    use super::*;

    fn loader() -> ConfigLoader {
        ConfigLoader::new(
            Settings::default(),
            Arc::new(fixed_env(Vec::<(String, String)>::new())),
        )
    }

    #[tokio::test]
    async fn jsonc_config_is_resolved_from_a_subdirectory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("wrangler.jsonc"),
            "{\n\t// the api\n\t\"name\": \"api\",\n\t\"main\": \"src/index.ts\",\n\t\"env\": {\n\t\t\"production\": {\"routes\": [\"api.example.com/*\"]}\n\t}\n}",
        )
        .unwrap();
        let nested = dir.path().join("src/handlers");
        std::fs::create_dir_all(&nested).unwrap();

        let mut options = LoadOptions::new(&nested);
        options.args.env = Some("production".to_string());
        let loaded = loader().load(&options).await.unwrap();

        assert_eq!(loaded.config.name(), Some("api-production"));
        assert_eq!(loaded.config.get("routes"), Some(&json!(["api.example.com/*"])));
        let main = loaded.config.main().unwrap();
        assert!(main.ends_with("src/index.ts"));
        assert!(Path::new(main).is_absolute());
    }

    #[tokio::test]
    async fn errors_become_invalid_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("wrangler.toml"),
            "name = \"api\"\n[env.prod]\nname = \"api\"\n",
        )
        .unwrap();

        let mut options = LoadOptions::new(dir.path());
        options.args.env = Some("dev".to_string());
        let err = loader().load(&options).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        match err {
            ConfigError::Invalid { rendered } => {
                assert!(rendered.contains("No environment found in configuration with name \"dev\"."));
            }
            other => panic!("expected an invalid config, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn explicit_config_path_is_used() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("custom.json");
        std::fs::write(&custom, r#"{"name": "custom"}"#).unwrap();
        std::fs::write(dir.path().join("wrangler.json"), r#"{"name": "default"}"#).unwrap();

        let mut options = LoadOptions::new(dir.path());
        options.config = Some(custom.clone());
        let loaded = loader().load(&options).await.unwrap();
        assert_eq!(loaded.config.name(), Some("custom"));
        assert_eq!(loaded.config.config_path, Some(custom));
    }
}
