#![warn(missing_docs)]
//! # chemviz-upload
//!
//! ## Purpose
//! Owns the CSV upload lifecycle and interprets analytics service replies.
//!
//! ## Responsibilities
//! - Admit at most one upload at a time; ignore re-entrant submissions.
//! - Send files through an injectable [`UploadTransport`].
//! - Classify failures into auth rejections and generic retryable errors.
//! - Keep the dashboard-visible snapshot until a new upload succeeds.
//!
//! ## Data flow
//! File selection -> [`UploadController::begin`] -> [`UploadTicket`] sent via
//! [`UploadTransport`] -> raw body or [`UploadError`] ->
//! [`UploadController::complete`] -> [`UploadState`] + [`UploadResolution`].
//!
//! ## Ownership and lifetimes
//! File contents live in a shared `Arc<[u8]>`, so the in-flight state and the
//! ticket handed to the transport refer to the same buffer.
//!
//! ## Error model
//! Transport failures are [`UploadError`] values; [`classify_upload_error`]
//! separates 401s (escalated as [`UploadResolution::SessionExpired`]) from
//! everything else, which leaves the session untouched.
//!
//! ## Security and privacy notes
//! Files are identified in logs by name, size and SHA-256 fingerprint; their
//! contents and the bearer token are never logged.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chemviz_auth::AuthToken;
use chemviz_core::{StatisticsSnapshot, parse_upload_response};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure text shown when the server rejects the session.
pub const SESSION_EXPIRED_MESSAGE: &str = "session expired";

/// Failure text shown for every non-auth upload failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to upload file. Make sure the server is running!";

/// One user-selected CSV file.
#[derive(Clone, PartialEq, Eq)]
pub struct FileRef {
    name: String,
    bytes: Arc<[u8]>,
    fingerprint: String,
}

impl FileRef {
    /// Wraps in-memory file contents.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let bytes: Arc<[u8]> = Arc::from(bytes);
        Self {
            name: name.into(),
            fingerprint: file_fingerprint(&bytes),
            bytes,
        }
    }

    /// Reads a file from disk, naming it after the path's final component.
    ///
    /// # Errors
    /// Returns [`UploadError::Io`] when the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|error| UploadError::Io(format!("{}: {error}", path.display())))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        Ok(Self::new(name, bytes))
    }

    /// File name sent in the multipart part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty file.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex SHA-256 of the contents.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRef")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Computes the lowercase hex SHA-256 of `bytes`.
pub fn file_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Upload lifecycle states.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    /// Nothing submitted since start or reset.
    Idle,
    /// One upload is outstanding.
    InFlight(FileRef),
    /// Last upload produced this snapshot.
    Succeeded(StatisticsSnapshot),
    /// Last upload failed with this user-visible message.
    Failed(String),
}

/// Request handed to the transport by [`UploadController::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    file: FileRef,
}

impl UploadTicket {
    /// File to send.
    pub fn file(&self) -> &FileRef {
        &self.file
    }
}

/// Transport that posts a file to the upload endpoint.
pub trait UploadTransport: Send + Sync {
    /// Sends `file` as multipart field `file` with `token` as `Authorization`.
    ///
    /// # Errors
    /// Returns [`UploadError`] for non-2xx statuses and transport failures.
    fn upload(&self, file: &FileRef, token: &AuthToken) -> Result<String, UploadError>;
}

/// Upload failure categories used for escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Credentials were rejected; the session must end.
    AuthRejected,
    /// Transient or server-side failure; retrying may succeed.
    Retriable,
    /// The request itself was refused (for example, missing CSV columns).
    Permanent,
}

/// Classifies an upload error.
pub fn classify_upload_error(error: &UploadError) -> FailureClass {
    match error {
        UploadError::Unauthorized => FailureClass::AuthRejected,
        UploadError::Client(_) | UploadError::Io(_) => FailureClass::Permanent,
        UploadError::Server(_)
        | UploadError::Timeout
        | UploadError::Transport(_)
        | UploadError::Malformed(_) => FailureClass::Retriable,
    }
}

/// What a completed upload means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadResolution {
    /// A new snapshot is visible.
    Succeeded,
    /// Non-auth failure; session untouched, retry allowed.
    Failed(FailureClass),
    /// The server returned 401; the caller must force a logout.
    SessionExpired,
    /// The call was a no-op (empty selection, upload outstanding, or a stray
    /// completion).
    Ignored,
}

/// Owner of the upload state machine and the dashboard-visible snapshot.
#[derive(Debug, Clone)]
pub struct UploadController {
    state: UploadState,
    snapshot: Option<StatisticsSnapshot>,
}

impl UploadController {
    /// Creates an idle controller with no snapshot.
    pub fn new() -> Self {
        Self {
            state: UploadState::Idle,
            snapshot: None,
        }
    }

    /// Creates an idle controller showing a snapshot from a previous run.
    pub fn with_snapshot(snapshot: StatisticsSnapshot) -> Self {
        Self {
            state: UploadState::Idle,
            snapshot: Some(snapshot),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Returns the dashboard-visible snapshot.
    pub fn snapshot(&self) -> Option<&StatisticsSnapshot> {
        self.snapshot.as_ref()
    }

    /// Returns `true` while an upload is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, UploadState::InFlight(_))
    }

    /// Number of outstanding uploads (0 or 1).
    pub fn pending_requests(&self) -> usize {
        usize::from(self.is_in_flight())
    }

    /// Starts an upload of `file`.
    ///
    /// Returns `None` without touching state when nothing was selected or an
    /// upload is already outstanding.
    pub fn begin(&mut self, file: Option<FileRef>) -> Option<UploadTicket> {
        let Some(file) = file else {
            tracing::debug!("upload ignored: no file selected");
            return None;
        };

        if self.is_in_flight() {
            tracing::debug!(file = file.name(), "upload ignored: another upload is in flight");
            return None;
        }

        tracing::info!(
            file = file.name(),
            bytes = file.len(),
            fingerprint = file.fingerprint(),
            "upload started"
        );
        self.state = UploadState::InFlight(file.clone());
        Some(UploadTicket { file })
    }

    /// Applies the transport result of the outstanding upload.
    pub fn complete(&mut self, result: Result<String, UploadError>) -> UploadResolution {
        if !self.is_in_flight() {
            tracing::debug!("upload completion ignored: nothing in flight");
            return UploadResolution::Ignored;
        }

        let error = match result.map(|body| parse_upload_response(&body)) {
            Ok(Ok(response)) => {
                let snapshot = response.statistics;
                tracing::info!(
                    total_count = snapshot.total_count(),
                    types = snapshot.distinct_types(),
                    batch_id = %snapshot.batch_id(),
                    "upload succeeded"
                );
                self.snapshot = Some(snapshot.clone());
                self.state = UploadState::Succeeded(snapshot);
                return UploadResolution::Succeeded;
            }
            Ok(Err(decode_error)) => UploadError::Malformed(decode_error.to_string()),
            Err(error) => error,
        };

        match classify_upload_error(&error) {
            FailureClass::AuthRejected => {
                tracing::warn!("upload rejected: session expired");
                self.snapshot = None;
                self.state = UploadState::Failed(SESSION_EXPIRED_MESSAGE.to_string());
                UploadResolution::SessionExpired
            }
            class => {
                tracing::warn!(%error, ?class, "upload failed");
                self.state = UploadState::Failed(GENERIC_FAILURE_MESSAGE.to_string());
                UploadResolution::Failed(class)
            }
        }
    }

    /// Runs both upload phases through `transport`.
    pub fn submit_file(
        &mut self,
        file: Option<FileRef>,
        token: &AuthToken,
        transport: &dyn UploadTransport,
    ) -> UploadResolution {
        let Some(ticket) = self.begin(file) else {
            return UploadResolution::Ignored;
        };
        let result = transport.upload(ticket.file(), token);
        self.complete(result)
    }

    /// Returns to `Idle` and drops the snapshot.
    pub fn reset(&mut self) {
        self.state = UploadState::Idle;
        self.snapshot = None;
    }
}

impl Default for UploadController {
    fn default() -> Self {
        Self::new()
    }
}

/// Upload transport and response errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Server returned 401.
    #[error("upload unauthorized")]
    Unauthorized,
    /// Server returned another 4xx status.
    #[error("upload refused with status {0}")]
    Client(u16),
    /// Server returned a 5xx or otherwise unexpected status.
    #[error("server error status {0}")]
    Server(u16),
    /// Request timed out.
    #[error("upload timed out")]
    Timeout,
    /// Request failed before a response arrived.
    #[error("upload transport failure: {0}")]
    Transport(String),
    /// 2xx body did not match the response contract.
    #[error("malformed upload response: {0}")]
    Malformed(String),
    /// Selected file could not be read.
    #[error("file read failure: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for fingerprinting and failure classification.

    use super::*;

    #[test]
    fn fingerprint_is_stable_and_content_addressed() {
        let a = FileRef::new("a.csv", b"Type\nPump\n".to_vec());
        let b = FileRef::new("b.csv", b"Type\nPump\n".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_eq!(
            file_fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn debug_output_omits_contents() {
        let file = FileRef::new("plant.csv", b"secret-row".to_vec());
        assert!(!format!("{file:?}").contains("secret-row"));
    }

    #[test]
    fn classifies_errors() {
        assert_eq!(
            classify_upload_error(&UploadError::Unauthorized),
            FailureClass::AuthRejected
        );
        assert_eq!(
            classify_upload_error(&UploadError::Server(503)),
            FailureClass::Retriable
        );
        assert_eq!(
            classify_upload_error(&UploadError::Client(400)),
            FailureClass::Permanent
        );
        assert_eq!(
            classify_upload_error(&UploadError::Malformed("eof".to_string())),
            FailureClass::Retriable
        );
    }

    #[test]
    fn stray_completion_is_ignored() {
        let mut controller = UploadController::new();
        assert_eq!(
            controller.complete(Err(UploadError::Timeout)),
            UploadResolution::Ignored
        );
        assert_eq!(controller.state(), &UploadState::Idle);
    }
}
