// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Config loading and module tests against the fixtures in `tests/data`.

use std::path::PathBuf;

use shoes::{AppConfig, Environment, ShoesError};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn test_missing_config_file_fails() {
    let err = Environment::new(Some("default"))
        .load_config(data("badconfig.json"), false)
        .unwrap_err();
    assert!(matches!(err, ShoesError::Io(_)));
}

#[test]
fn test_invalid_json_fails() {
    let err = Environment::new(Some("default"))
        .load_config(data("invalid.json"), false)
        .unwrap_err();
    assert!(matches!(err, ShoesError::ConfigParse(_)));
    assert!(err.to_string().starts_with("Error parsing config"));
}

#[test]
fn test_default_section() {
    let config = Environment::new(Some("default"))
        .load_config(data("default.json"), false)
        .unwrap();
    assert_eq!(config["foo"], "bar");
}

#[test]
fn test_environment_section() {
    let config = Environment::new(Some("dev"))
        .load_config(data("env.json"), false)
        .unwrap();
    assert_eq!(config["foo"], "bar");
}

#[test]
fn test_defaults_are_merged() {
    let config = Environment::new(Some("dev"))
        .load_config(data("env2.json"), true)
        .unwrap();
    assert_eq!(config["a"], "a");
    assert_eq!(config["b"], "b");
    assert_eq!(config["c"], "c");
}

#[test]
fn test_objects_merge_recursively() {
    let config = Environment::new(Some("dev"))
        .load_config(data("env2.json"), true)
        .unwrap();
    assert_eq!(config["obj"]["a"], "a");
    assert_eq!(config["obj"]["b"], "b");
    assert_eq!(config["obj"]["c"], "c");
}

#[test]
fn test_strict_requires_section() {
    let err = Environment::new(Some("dev"))
        .load_config(data("default.json"), true)
        .unwrap_err();
    assert!(matches!(err, ShoesError::UnknownEnvironment(ref name) if name == "dev"));
}

#[test]
fn test_config_feeds_app_config() {
    let config = Environment::new(Some("dev"))
        .load_config(data("env2.json"), false)
        .unwrap();
    let app = AppConfig::from_value(config).unwrap();
    assert!(!app.production);
    assert_eq!(app.static_dir, "public");
    assert_eq!(app.settings["obj"]["c"], "c");
}

#[test]
fn test_load_modules_skips_other_files() {
    let modules = Environment::new(Some("dev"))
        .load_modules(data("modules"))
        .unwrap();
    let names: Vec<&str> = modules.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["bar", "foo"]);
}

#[test]
fn test_call_modules() {
    let results = Environment::new(Some("dev"))
        .call_modules(data("modules"), |_, module| {
            format!("{}lol", module["name"].as_str().unwrap_or_default())
        })
        .unwrap();
    assert_eq!(results["foo"], "foolol");
    assert_eq!(results["bar"], "barlol");
}
