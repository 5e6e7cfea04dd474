//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use chemviz_core::{ApiEndpoints, DEFAULT_API_BASE};

use crate::AppError;

/// Base URL of the analytics service.
pub const API_URL_ENV: &str = "CHEMVIZ_API_URL";

/// Fallback base URL variable shared with the other dashboard clients.
pub const LEGACY_API_URL_ENV: &str = "API_URL";

/// Login probe timeout in whole seconds.
pub const PROBE_TIMEOUT_ENV: &str = "CHEMVIZ_PROBE_TIMEOUT_SECS";

/// Preference file location.
pub const PREFS_PATH_ENV: &str = "CHEMVIZ_PREFS_PATH";

/// Login probe timeout used when none is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Preference file used when none is configured.
pub const DEFAULT_PREFS_PATH: &str = ".chemviz/preferences.json";

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Analytics service endpoints.
    pub endpoints: ApiEndpoints,
    /// Timeout applied to the login probe only.
    pub probe_timeout: Duration,
    /// JSON preference file.
    pub prefs_path: PathBuf,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// See [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`; blank values count as unset.
    ///
    /// # Errors
    /// Returns [`AppError::Core`] for an unusable base URL and
    /// [`AppError::Config`] for a non-numeric or zero probe timeout.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let value_of = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base = value_of(API_URL_ENV)
            .or_else(|| value_of(LEGACY_API_URL_ENV))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let endpoints = ApiEndpoints::parse(&base)?;

        let probe_timeout = match value_of(PROBE_TIMEOUT_ENV) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_PROBE_TIMEOUT,
        };

        let prefs_path = value_of(PREFS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFS_PATH));

        Ok(Self {
            endpoints,
            probe_timeout,
            prefs_path,
        })
    }

    /// Replaces the base URL.
    ///
    /// # Errors
    /// Returns [`AppError::Core`] for an unusable base URL.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, AppError> {
        self.endpoints = ApiEndpoints::parse(base)?;
        Ok(self)
    }

    /// Replaces the preference file path.
    pub fn with_prefs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.prefs_path = path.into();
        self
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, AppError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(AppError::Config(format!(
            "{PROBE_TIMEOUT_ENV} must be greater than zero"
        ))),
        Ok(seconds) => Ok(Duration::from_secs(seconds)),
        Err(error) => Err(AppError::Config(format!(
            "{PROBE_TIMEOUT_ENV}={raw}: {error}"
        ))),
    }
}
