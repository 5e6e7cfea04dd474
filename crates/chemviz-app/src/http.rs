//! Blocking `reqwest` transport for the analytics service.

use std::time::Duration;

use chemviz_auth::{AuthToken, AuthTransport, ProbeOutcome};
use chemviz_core::ApiEndpoints;
use chemviz_upload::{FileRef, UploadError, UploadTransport};
use reqwest::blocking::{Client, Response, multipart};
use reqwest::header::AUTHORIZATION;
use url::Url;

use crate::{AppError, ReportTransport, redact_sensitive};

/// HTTP client bound to one analytics service.
///
/// Only the login probe carries a timeout; uploads and report downloads run
/// until the server answers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoints: ApiEndpoints,
    probe_timeout: Duration,
}

impl HttpTransport {
    /// Builds the client.
    ///
    /// # Errors
    /// Returns [`AppError::Http`] when the TLS backend cannot be initialized.
    pub fn new(endpoints: ApiEndpoints, probe_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("chemviz/", env!("CHEMVIZ_VERSION")))
            .timeout(None)
            .build()
            .map_err(|error| AppError::Http(error.to_string()))?;

        Ok(Self {
            client,
            endpoints,
            probe_timeout,
        })
    }
}

impl AuthTransport for HttpTransport {
    fn probe(&self, token: &AuthToken) -> ProbeOutcome {
        let result = self
            .client
            .get(self.endpoints.upload_url())
            .header(AUTHORIZATION, token.header_value())
            .timeout(self.probe_timeout)
            .send();

        match result {
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(error) if error.is_timeout() => ProbeOutcome::TimedOut,
            Err(error) => ProbeOutcome::Transport(redact_sensitive(&error.to_string())),
        }
    }
}

impl UploadTransport for HttpTransport {
    fn upload(&self, file: &FileRef, token: &AuthToken) -> Result<String, UploadError> {
        let part = multipart::Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str("text/csv")
            .map_err(transport_error)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoints.upload_url())
            .header(AUTHORIZATION, token.header_value())
            .multipart(form)
            .send()
            .map_err(transport_error)?;

        read_success(response)?.text().map_err(transport_error)
    }
}

impl ReportTransport for HttpTransport {
    fn fetch_report(&self, url: &Url, token: &AuthToken) -> Result<Vec<u8>, UploadError> {
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, token.header_value())
            .send()
            .map_err(transport_error)?;

        read_success(response)?
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(transport_error)
    }
}

/// Maps a non-2xx status to an [`UploadError`].
pub fn upload_error_for_status(status: u16) -> UploadError {
    match status {
        401 => UploadError::Unauthorized,
        400..=499 => UploadError::Client(status),
        _ => UploadError::Server(status),
    }
}

fn read_success(response: Response) -> Result<Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies look like {"error": "..."}; keep the detail in logs only.
    let detail = response
        .text()
        .ok()
        .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
        .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string));
    tracing::debug!(status = status.as_u16(), detail = detail.as_deref(), "server refused request");

    Err(upload_error_for_status(status.as_u16()))
}

fn transport_error(error: reqwest::Error) -> UploadError {
    if error.is_timeout() {
        UploadError::Timeout
    } else {
        UploadError::Transport(redact_sensitive(&error.to_string()))
    }
}
