//! Config discovery from relative start directories.
//!
//! Kept in its own test binary: it changes the process working directory.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wrangler_config::config::{LocateOptions, find_config, resolve_config_paths};

#[test]
fn relative_start_searches_real_parents() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let nested = root.join("app/src");
    fs::create_dir_all(&nested).unwrap();
    fs::write(root.join("wrangler.toml"), "name = \"app\"\n").unwrap();
    fs::create_dir_all(root.join("dist")).unwrap();
    fs::write(root.join("dist/wrangler.json"), "{}").unwrap();
    fs::create_dir_all(root.join(".wrangler/deploy")).unwrap();
    fs::write(
        root.join(".wrangler/deploy/config.json"),
        r#"{ "configPath": "../../dist/wrangler.json" }"#,
    )
    .unwrap();

    std::env::set_current_dir(&nested).unwrap();

    assert_eq!(find_config(Path::new(".")), Some(root.join("wrangler.toml")));

    let options = LocateOptions {
        use_redirect: false,
        ..LocateOptions::default()
    };
    let paths = resolve_config_paths(Path::new("."), None, &options).unwrap();
    assert_eq!(paths.user_config_path, Some(root.join("wrangler.toml")));

    let paths = resolve_config_paths(Path::new("../src"), None, &LocateOptions::default()).unwrap();
    assert!(paths.redirected);
    assert_eq!(paths.user_config_path, Some(root.join("wrangler.toml")));
    assert_eq!(
        paths.deploy_config_path,
        Some(root.join(".wrangler/deploy/config.json"))
    );
}
