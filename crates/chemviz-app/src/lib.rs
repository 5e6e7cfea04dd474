#![warn(missing_docs)]
//! # chemviz-app
//!
//! ## Purpose
//! Orchestrates theme, session, upload and presentation state for `chemviz`.
//!
//! ## Responsibilities
//! - Gate uploads and report downloads behind an authenticated session.
//! - Escalate 401 responses from any authenticated call to a forced logout.
//! - Clear upload state and statistics whenever the session ends.
//! - Provide the `reqwest` transport, environment configuration and log
//!   redaction used by the `chemviz` binary.
//!
//! ## Data flow
//! [`AppConfig`] -> [`HttpTransport`] + [`Dashboard::start`] -> user commands
//! (login, upload, export, theme) -> controller transitions ->
//! [`Dashboard::ui_state`] -> renderer.
//!
//! ## Ownership and lifetimes
//! [`Dashboard`] owns both state machines; transports are borrowed per call so
//! tests can substitute scripted fakes.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]; none of them is fatal to
//! the state machines, which always land in a re-enterable state.
//!
//! ## Security and privacy notes
//! - The bearer token is only ever written to the preference store and the
//!   `Authorization` header.
//! - Log redaction helpers strip token/credential strings.

mod config;
mod dashboard;
mod http;

pub use config::{
    API_URL_ENV, AppConfig, DEFAULT_PREFS_PATH, DEFAULT_PROBE_TIMEOUT, LEGACY_API_URL_ENV,
    PREFS_PATH_ENV, PROBE_TIMEOUT_ENV,
};
pub use dashboard::{Dashboard, LAST_SNAPSHOT_KEY, ReportTransport};
pub use http::{HttpTransport, upload_error_for_status};

use std::path::PathBuf;

use chemviz_auth::AuthError;
use chemviz_core::CoreError;
use chemviz_prefs::PreferenceError;
use chemviz_upload::UploadError;
use thiserror::Error;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("CHEMVIZ_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Redacts common secret markers in log-safe output.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for key in ["password", "token", "authorization", "bearer", "basic"] {
        redacted = redact_key_value(&redacted, key);
    }
    redacted
}

fn redact_key_value(input: &str, key: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if let Some(position) = lower.find(key) {
        let prefix = &input[..position];
        return format!("{prefix}{key}=<redacted>");
    }

    input.to_string()
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Session subsystem error.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Upload or report transfer error.
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// Contract or endpoint error.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Preference store error.
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
    /// Configuration value is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Http(String),
    /// Operation requires a logged-in session.
    #[error("not logged in")]
    NotAuthenticated,
    /// The server rejected the session; it has been closed.
    #[error("session expired")]
    SessionExpired,
    /// No successful upload backs a report yet.
    #[error("no uploaded batch to export; upload a CSV first")]
    NoReport,
    /// Downloaded report could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Output {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    //! Unit tests for redaction.

    use super::*;

    #[test]
    fn redacts_basic_header_values() {
        let redacted = redact_sensitive("header: Basic YWRtaW46cGFzc3dvcmQxMjM=");
        assert!(!redacted.contains("YWRtaW46"));
        assert!(redacted.ends_with("<redacted>"));
    }

    #[test]
    fn leaves_clean_text_alone() {
        assert_eq!(redact_sensitive("connection refused"), "connection refused");
    }
}
