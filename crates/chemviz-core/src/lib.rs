#![warn(missing_docs)]
//! # chemviz-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `chemviz` workspace.
//!
//! ## Responsibilities
//! - Represent the statistics snapshot produced by a successful upload.
//! - Parse the upload response contract of the equipment analytics service.
//! - Derive API endpoint URLs from a configured base URL.
//! - Name the light/dark theme preference and its persisted encoding.
//!
//! ## Data flow
//! Raw upload response -> [`parse_upload_response`] -> [`StatisticsSnapshot`]
//! -> upload controller state -> dashboard projection.
//!
//! ## Ownership and lifetimes
//! Snapshots own their labels and identifiers so they can outlive the network
//! buffer they were decoded from and be shared read-only with presentation.
//!
//! ## Error model
//! Malformed payloads and unusable base URLs return [`CoreError`] variants.
//!
//! ## Security and privacy notes
//! This crate never sees credentials; it only handles aggregate statistics.
//!
//! ## Example
//! ```rust
//! use chemviz_core::{ApiEndpoints, ThemePreference};
//!
//! let endpoints = ApiEndpoints::parse("http://127.0.0.1:8000/").unwrap();
//! assert_eq!(endpoints.upload_url().as_str(), "http://127.0.0.1:8000/api/upload/");
//! assert_eq!(ThemePreference::Dark.toggled(), ThemePreference::Light);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default base URL of the analytics service.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Light/dark presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemePreference {
    /// Light mode.
    Light,
    /// Dark mode.
    Dark,
}

impl ThemePreference {
    /// Returns the persisted string form (`"light"` or `"dark"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parses the persisted string form. Unknown values yield `None`.
    pub fn from_persisted(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// Returns the opposite mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Returns `true` for [`ThemePreference::Dark`].
    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of one server-side upload batch.
///
/// The service emits numeric ids; string ids are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawBatchId", into = "String")]
pub struct BatchId(String);

impl BatchId {
    /// Wraps an identifier value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatchId {
    Text(String),
    Number(u64),
}

impl From<RawBatchId> for BatchId {
    fn from(raw: RawBatchId) -> Self {
        match raw {
            RawBatchId::Text(text) => Self(text),
            RawBatchId::Number(number) => Self(number.to_string()),
        }
    }
}

/// Summary statistics of one uploaded equipment CSV.
///
/// Values are fixed at construction; consumers only read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    total_count: u64,
    average_flowrate: f64,
    average_pressure: f64,
    average_temperature: f64,
    type_distribution: BTreeMap<String, u64>,
    batch_id: BatchId,
}

impl StatisticsSnapshot {
    /// Builds a snapshot from already-validated values.
    pub fn new(
        total_count: u64,
        average_flowrate: f64,
        average_pressure: f64,
        average_temperature: f64,
        type_distribution: BTreeMap<String, u64>,
        batch_id: BatchId,
    ) -> Self {
        Self {
            total_count,
            average_flowrate,
            average_pressure,
            average_temperature,
            type_distribution,
            batch_id,
        }
    }

    /// Number of equipment rows in the upload.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Mean flowrate across rows.
    pub fn average_flowrate(&self) -> f64 {
        self.average_flowrate
    }

    /// Mean pressure across rows.
    pub fn average_pressure(&self) -> f64 {
        self.average_pressure
    }

    /// Mean temperature across rows.
    pub fn average_temperature(&self) -> f64 {
        self.average_temperature
    }

    /// Equipment-type label to row count.
    pub fn type_distribution(&self) -> &BTreeMap<String, u64> {
        &self.type_distribution
    }

    /// Number of distinct equipment-type labels.
    pub fn distinct_types(&self) -> usize {
        self.type_distribution.len()
    }

    /// Server batch that produced this snapshot.
    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    /// Serializes the snapshot to compact JSON.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(CoreError::Codec)
    }

    /// Restores a snapshot from its own JSON encoding.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON decoding fails.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(CoreError::Codec)
    }
}

/// Parsed success body of `POST /api/upload/`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse {
    /// Statistics computed by the service.
    pub statistics: StatisticsSnapshot,
    /// Optional human-readable status message.
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponseWire {
    statistics: StatisticsWire,
    #[serde(default)]
    batch_id: Option<BatchId>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct StatisticsWire {
    total_count: u64,
    average_flowrate: f64,
    average_pressure: f64,
    average_temperature: f64,
    type_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    batch_id: Option<BatchId>,
}

/// Parses a raw upload response body.
///
/// `batch_id` is taken from `statistics.batch_id` and falls back to the
/// top-level `batch_id` field.
///
/// # Errors
/// Returns [`CoreError::Codec`] for invalid JSON or missing statistic fields.
/// Returns [`CoreError::InvalidContract`] when no batch id is present or a
/// distribution label is blank.
pub fn parse_upload_response(raw: &str) -> Result<UploadResponse, CoreError> {
    let wire: UploadResponseWire = serde_json::from_str(raw).map_err(CoreError::Codec)?;
    let stats = wire.statistics;

    let batch_id = stats
        .batch_id
        .or(wire.batch_id)
        .filter(|id| !id.as_str().trim().is_empty())
        .ok_or_else(|| CoreError::InvalidContract("batch_id is missing".to_string()))?;

    if stats
        .type_distribution
        .keys()
        .any(|label| label.trim().is_empty())
    {
        return Err(CoreError::InvalidContract(
            "type_distribution contains a blank label".to_string(),
        ));
    }

    Ok(UploadResponse {
        statistics: StatisticsSnapshot::new(
            stats.total_count,
            stats.average_flowrate,
            stats.average_pressure,
            stats.average_temperature,
            stats.type_distribution,
            batch_id,
        ),
        message: wire.message,
    })
}

/// Endpoint set of the analytics service derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base: Url,
}

impl ApiEndpoints {
    /// Validates a base URL and derives endpoints from it.
    ///
    /// One trailing slash is tolerated; only `http` and `https` are accepted.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidBaseUrl`] for unparseable URLs, other
    /// schemes, or URLs carrying a query or fragment.
    pub fn parse(base: &str) -> Result<Self, CoreError> {
        let trimmed = base.trim();
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let parsed = Url::parse(trimmed)
            .map_err(|error| CoreError::InvalidBaseUrl(format!("{trimmed}: {error}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidBaseUrl(format!(
                "{trimmed}: scheme must be http or https"
            )));
        }

        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(CoreError::InvalidBaseUrl(format!(
                "{trimmed}: base url cannot carry a query or fragment"
            )));
        }

        Ok(Self { base: parsed })
    }

    /// Returns the normalized base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/api/upload/`, used for uploads and the login probe.
    pub fn upload_url(&self) -> Url {
        self.join(&["api", "upload"])
    }

    /// `{base}/api/export-pdf/{batch_id}/`.
    pub fn export_pdf_url(&self, batch_id: &BatchId) -> Url {
        self.join(&["api", "export-pdf", batch_id.as_str()])
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // http(s) urls always have a path, so segment editing cannot fail.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments).push("");
        }
        url
    }
}

/// Error type for contract decoding and endpoint validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON encoding/decoding error.
    #[error("payload codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// Decoded payload violates contract expectations.
    #[error("upload response contract violation: {0}")]
    InvalidContract(String),
    /// Configured base URL is unusable.
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for contract parsing and endpoint derivation.

    use super::*;

    #[test]
    fn reads_batch_id_from_statistics_first() {
        let raw = r#"{
            "batch_id": 9,
            "statistics": {
                "total_count": 1, "average_flowrate": 1.0, "average_pressure": 2.0,
                "average_temperature": 3.0, "type_distribution": {"Pump": 1},
                "batch_id": "b-1"
            }
        }"#;

        let parsed = parse_upload_response(raw).expect("response should parse");
        assert_eq!(parsed.statistics.batch_id().as_str(), "b-1");
    }

    #[test]
    fn falls_back_to_numeric_top_level_batch_id() {
        let raw = r#"{
            "message": "File processed successfully",
            "batch_id": 42,
            "statistics": {
                "total_count": 0, "average_flowrate": 0.0, "average_pressure": 0.0,
                "average_temperature": 0.0, "type_distribution": {}
            }
        }"#;

        let parsed = parse_upload_response(raw).expect("response should parse");
        assert_eq!(parsed.statistics.batch_id().as_str(), "42");
        assert_eq!(parsed.message.as_deref(), Some("File processed successfully"));
    }

    #[test]
    fn rejects_response_without_batch_id() {
        let raw = r#"{"statistics": {
            "total_count": 0, "average_flowrate": 0.0, "average_pressure": 0.0,
            "average_temperature": 0.0, "type_distribution": {}
        }}"#;

        assert!(matches!(
            parse_upload_response(raw),
            Err(CoreError::InvalidContract(_))
        ));
    }

    #[test]
    fn endpoints_trim_trailing_slash_and_encode_batch_id() {
        let endpoints = ApiEndpoints::parse("https://plant.example.test/").expect("valid base");
        assert_eq!(
            endpoints.export_pdf_url(&BatchId::new("b 1")).as_str(),
            "https://plant.example.test/api/export-pdf/b%201/"
        );
        assert!(ApiEndpoints::parse("ftp://plant.example.test").is_err());
    }

    #[test]
    fn theme_persisted_form_round_trips() {
        for theme in [ThemePreference::Light, ThemePreference::Dark] {
            assert_eq!(ThemePreference::from_persisted(theme.as_str()), Some(theme));
        }
        assert_eq!(ThemePreference::from_persisted("sepia"), None);
    }
}
