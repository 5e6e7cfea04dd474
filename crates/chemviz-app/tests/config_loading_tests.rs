//! Integration tests for environment configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chemviz_app::{
    API_URL_ENV, AppConfig, AppError, DEFAULT_PREFS_PATH, DEFAULT_PROBE_TIMEOUT,
    LEGACY_API_URL_ENV, PREFS_PATH_ENV, PROBE_TIMEOUT_ENV,
};

fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, AppError> {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    AppConfig::from_lookup(|key| env.get(key).cloned())
}

#[test]
fn config_loading_tests_defaults_without_environment() {
    let config = load(&[]).expect("defaults should load");

    assert_eq!(config.endpoints.base().as_str(), "http://127.0.0.1:8000/");
    assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
    assert_eq!(config.prefs_path, PathBuf::from(DEFAULT_PREFS_PATH));
}

#[test]
fn config_loading_tests_primary_url_wins_over_legacy() {
    let config = load(&[
        (API_URL_ENV, "https://analytics.example.com/"),
        (LEGACY_API_URL_ENV, "http://legacy.example.com"),
    ])
    .expect("config");

    assert_eq!(
        config.endpoints.upload_url().as_str(),
        "https://analytics.example.com/api/upload/"
    );
}

#[test]
fn config_loading_tests_legacy_url_used_when_primary_blank() {
    let config = load(&[(API_URL_ENV, "  "), (LEGACY_API_URL_ENV, "http://legacy.example.com/")])
        .expect("config");

    assert_eq!(
        config.endpoints.upload_url().as_str(),
        "http://legacy.example.com/api/upload/"
    );
}

#[test]
fn config_loading_tests_rejects_unusable_values() {
    assert!(matches!(
        load(&[(API_URL_ENV, "ftp://files.example.com")]),
        Err(AppError::Core(_))
    ));
    assert!(matches!(
        load(&[(PROBE_TIMEOUT_ENV, "0")]),
        Err(AppError::Config(_))
    ));
    assert!(matches!(
        load(&[(PROBE_TIMEOUT_ENV, "soon")]),
        Err(AppError::Config(_))
    ));
}

#[test]
fn config_loading_tests_overrides_apply() {
    let config = load(&[(PROBE_TIMEOUT_ENV, "3"), (PREFS_PATH_ENV, "/tmp/prefs.json")])
        .expect("config")
        .with_api_base("http://10.0.0.5:9000")
        .expect("override base")
        .with_prefs_path("other.json");

    assert_eq!(config.probe_timeout, Duration::from_secs(3));
    assert_eq!(config.prefs_path, PathBuf::from("other.json"));
    assert_eq!(
        config.endpoints.upload_url().as_str(),
        "http://10.0.0.5:9000/api/upload/"
    );
}
