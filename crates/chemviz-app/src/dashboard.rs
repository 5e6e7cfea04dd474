//! Dashboard orchestrator tying theme, session and upload state together.

use std::sync::Arc;

use chemviz_auth::{AuthToken, AuthTransport, ProbeVerdict, SessionManager, SessionState};
use chemviz_core::{ApiEndpoints, StatisticsSnapshot, ThemePreference};
use chemviz_prefs::{AmbientTheme, PreferenceStore, ThemeController, ThemeSurface};
use chemviz_ui::{StageStatus, UiAuthState, UiState, project_dashboard};
use chemviz_upload::{
    FileRef, UploadController, UploadError, UploadResolution, UploadState, UploadTicket,
    UploadTransport,
};
use url::Url;

use crate::{AppError, app_version};

/// Store key caching the last successful snapshot between runs.
pub const LAST_SNAPSHOT_KEY: &str = "lastSnapshot";

/// Transport that downloads a generated report.
pub trait ReportTransport: Send + Sync {
    /// Fetches `url` with `token` as `Authorization`.
    ///
    /// # Errors
    /// Returns [`UploadError`] for non-2xx statuses and transport failures.
    fn fetch_report(&self, url: &Url, token: &AuthToken) -> Result<Vec<u8>, UploadError>;
}

/// Top-level controller of one dashboard session.
pub struct Dashboard {
    endpoints: ApiEndpoints,
    store: Arc<dyn PreferenceStore>,
    theme_controller: ThemeController,
    theme: ThemePreference,
    session: SessionManager,
    upload: UploadController,
}

impl Dashboard {
    /// Initializes theme and session from `store`.
    ///
    /// A cached snapshot is shown again only when a session was restored.
    pub fn start(
        endpoints: ApiEndpoints,
        store: Arc<dyn PreferenceStore>,
        surface: Arc<dyn ThemeSurface>,
        ambient: &dyn AmbientTheme,
    ) -> Self {
        let theme_controller = ThemeController::new(store.clone(), surface);
        let theme = theme_controller.initialize(ambient);
        let session = SessionManager::restore(store.clone());

        let cached = session
            .is_authenticated()
            .then(|| store.get(LAST_SNAPSHOT_KEY))
            .flatten()
            .and_then(|raw| match StatisticsSnapshot::from_json(&raw) {
                Ok(snapshot) => Some(snapshot),
                Err(error) => {
                    tracing::debug!(%error, "cached snapshot discarded");
                    None
                }
            });
        let upload = match cached {
            Some(snapshot) => UploadController::with_snapshot(snapshot),
            None => UploadController::new(),
        };

        Self {
            endpoints,
            store,
            theme_controller,
            theme,
            session,
            upload,
        }
    }

    /// Current theme.
    pub fn theme(&self) -> ThemePreference {
        self.theme
    }

    /// Session state machine.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Upload state machine.
    pub fn upload(&self) -> &UploadController {
        &self.upload
    }

    /// Service endpoints.
    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Flips and persists the theme.
    pub fn toggle_theme(&mut self) -> ThemePreference {
        self.theme = self.theme_controller.toggle(self.theme);
        self.theme
    }

    /// Logs in through `transport`.
    ///
    /// Input rejected locally leaves the session and statistics untouched.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`] for validation failures, a login already in
    /// progress, or rejected credentials.
    pub fn login(
        &mut self,
        identifier: &str,
        secret: &str,
        transport: &dyn AuthTransport,
    ) -> Result<ProbeVerdict, AppError> {
        let was_authenticated = self.session.is_authenticated();
        let probe = self.session.begin_login(identifier, secret)?;
        if was_authenticated {
            // A new identity must not inherit the previous identity's data.
            self.clear_statistics();
        }
        let outcome = transport.probe(probe.token());
        Ok(self.session.complete_login(outcome)?)
    }

    /// Ends the session and clears statistics and upload state.
    pub fn logout(&mut self) {
        self.session.logout();
        self.clear_statistics();
    }

    /// Starts an upload; see [`UploadController::begin`].
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] without a session.
    pub fn begin_upload(&mut self, file: Option<FileRef>) -> Result<Option<UploadTicket>, AppError> {
        if !self.session.is_authenticated() {
            return Err(AppError::NotAuthenticated);
        }
        Ok(self.upload.begin(file))
    }

    /// Applies the transport result of the outstanding upload.
    ///
    /// Success caches the snapshot; a 401 forces the session closed.
    pub fn complete_upload(&mut self, result: Result<String, UploadError>) -> UploadResolution {
        let resolution = self.upload.complete(result);
        match resolution {
            UploadResolution::Succeeded => self.cache_snapshot(),
            UploadResolution::SessionExpired => {
                self.session.on_unauthorized();
                self.forget_cached_snapshot();
            }
            UploadResolution::Failed(_) | UploadResolution::Ignored => {}
        }
        resolution
    }

    /// Runs both upload phases through `transport`.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] without a session.
    pub fn submit_file(
        &mut self,
        file: Option<FileRef>,
        transport: &dyn UploadTransport,
    ) -> Result<UploadResolution, AppError> {
        let token = self.session.token().cloned().ok_or(AppError::NotAuthenticated)?;
        let Some(ticket) = self.upload.begin(file) else {
            return Ok(UploadResolution::Ignored);
        };
        let result = transport.upload(ticket.file(), &token);
        Ok(self.complete_upload(result))
    }

    /// Report URL of the visible snapshot.
    pub fn export_pdf_url(&self) -> Option<Url> {
        self.upload
            .snapshot()
            .map(|snapshot| self.endpoints.export_pdf_url(snapshot.batch_id()))
    }

    /// Downloads the report of the visible snapshot.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] without a session,
    /// [`AppError::NoReport`] without a snapshot, [`AppError::SessionExpired`]
    /// after a 401 (the session is closed), and [`AppError::Upload`] for other
    /// failures.
    pub fn download_report(&mut self, transport: &dyn ReportTransport) -> Result<Vec<u8>, AppError> {
        let token = self.session.token().cloned().ok_or(AppError::NotAuthenticated)?;
        let url = self.export_pdf_url().ok_or(AppError::NoReport)?;

        match transport.fetch_report(&url, &token) {
            Ok(bytes) => {
                tracing::info!(bytes = bytes.len(), "report downloaded");
                Ok(bytes)
            }
            Err(UploadError::Unauthorized) => {
                self.session.on_unauthorized();
                self.clear_statistics();
                Err(AppError::SessionExpired)
            }
            Err(error) => {
                tracing::warn!(%error, "report download failed");
                Err(error.into())
            }
        }
    }

    /// Projects the current state for rendering.
    pub fn ui_state(&self) -> UiState {
        let mut state = UiState::new(app_version(), self.theme);
        state.auth = match self.session.state() {
            SessionState::Anonymous => UiAuthState::Anonymous,
            SessionState::Authenticating => UiAuthState::Authenticating,
            SessionState::Authenticated(_) => UiAuthState::Authenticated,
        };
        state.session_notice = self.session.notice().map(|notice| notice.to_string());
        (state.upload, state.upload_message) = match self.upload.state() {
            UploadState::Idle => (StageStatus::Idle, None),
            UploadState::InFlight(file) => (
                StageStatus::Running,
                Some(format!("Processing {}...", file.name())),
            ),
            UploadState::Succeeded(_) => (
                StageStatus::Healthy,
                Some("File uploaded and processed successfully!".to_string()),
            ),
            UploadState::Failed(message) => (StageStatus::Degraded, Some(message.clone())),
        };
        state.dashboard = project_dashboard(self.upload.snapshot());
        state
    }

    fn clear_statistics(&mut self) {
        self.upload.reset();
        self.forget_cached_snapshot();
    }

    fn cache_snapshot(&self) {
        let Some(snapshot) = self.upload.snapshot() else {
            return;
        };
        let stored = snapshot
            .to_json()
            .map_err(AppError::from)
            .and_then(|raw| Ok(self.store.set(LAST_SNAPSHOT_KEY, &raw)?));
        if let Err(error) = stored {
            tracing::debug!(%error, "snapshot not cached");
        }
    }

    fn forget_cached_snapshot(&self) {
        if let Err(error) = self.store.remove(LAST_SNAPSHOT_KEY) {
            tracing::debug!(%error, "cached snapshot not cleared");
        }
    }
}
