#![warn(missing_docs)]
//! # chemviz-auth
//!
//! ## Purpose
//! Implements credential encoding and the session lifecycle for `chemviz`.
//!
//! ## Responsibilities
//! - Validate login input locally before any network traffic.
//! - Encode credentials into the opaque `Authorization` token.
//! - Map credential-probe outcomes onto session transitions (fail-open).
//! - Persist, restore and clear the token in the shared preference store.
//!
//! ## Data flow
//! Login form -> [`SessionManager::begin_login`] -> [`LoginProbe`] sent through
//! [`AuthTransport`] -> [`ProbeOutcome`] -> [`SessionManager::complete_login`]
//! -> [`SessionState`] + persisted `authHeader`.
//!
//! ## Ownership and lifetimes
//! The manager exclusively owns [`SessionState`]. Credentials are borrowed for
//! the duration of encoding only; just the derived [`AuthToken`] is retained.
//!
//! ## Error model
//! Local validation failures and rejected credentials surface as [`AuthError`].
//! Inconclusive probes are deliberately not errors: the session is admitted
//! and the next authenticated call settles validity.
//!
//! ## Security and privacy notes
//! Token and secret values never appear in `Debug` output or logs.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//!
//! use chemviz_auth::{ProbeOutcome, SessionManager, SessionState};
//! use chemviz_prefs::MemoryPreferenceStore;
//!
//! let mut session = SessionManager::restore(Arc::new(MemoryPreferenceStore::new()));
//! assert!(matches!(session.state(), SessionState::Anonymous));
//!
//! let _probe = session.begin_login("admin", "password123").unwrap();
//! session.complete_login(ProbeOutcome::Status(405)).unwrap();
//! assert!(session.is_authenticated());
//! ```

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chemviz_prefs::PreferenceStore;
use thiserror::Error;

/// Store key holding the persisted `Authorization` header value.
pub const AUTH_HEADER_KEY: &str = "authHeader";

/// Status returned by the probe endpoint for rejected credentials.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Status returned by the probe endpoint when the verb is not allowed.
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;

/// User-provided login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account identifier.
    pub identifier: String,
    /// Account secret.
    pub secret: String,
}

impl Credentials {
    /// Bundles an identifier/secret pair.
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// Checks the pair can be sent.
    ///
    /// # Errors
    /// Returns [`AuthError::EmptyCredential`] when either field is blank and
    /// [`AuthError::InvalidIdentifier`] when the identifier contains `:`.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.identifier.trim().is_empty() || self.secret.trim().is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        // Basic auth splits on the first colon.
        if self.identifier.contains(':') {
            return Err(AuthError::InvalidIdentifier);
        }

        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer value sent as the `Authorization` header.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthToken(String);

impl AuthToken {
    /// Derives the token for `credentials`: `Basic base64(identifier:secret)`.
    pub fn from_credentials(credentials: &Credentials) -> Self {
        let raw = format!("{}:{}", credentials.identifier, credentials.secret);
        Self(format!("Basic {}", STANDARD.encode(raw)))
    }

    /// Wraps a previously persisted header value; blank values yield `None`.
    pub fn from_persisted(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Returns the full `Authorization` header value.
    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No credential is active; uploads are gated.
    Anonymous,
    /// A login probe is outstanding.
    Authenticating,
    /// A token is active.
    Authenticated(AuthToken),
}

/// Raw result of one credential probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with this HTTP status.
    Status(u16),
    /// The request never produced a response.
    Transport(String),
    /// The probe exceeded its timeout.
    TimedOut,
}

/// How a probe outcome is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// Credentials were rejected (401).
    Rejected,
    /// Credentials were accepted; the endpoint refused only the verb (405).
    Accepted,
    /// Inconclusive outcome; the session is admitted without verification.
    AdmittedUnverified,
}

/// Maps a probe outcome to its verdict.
///
/// Only 401 rejects. 405 means the credential passed authentication and the
/// endpoint merely refuses `GET`. Every other outcome, including success,
/// server errors, network failures and timeouts, admits the session.
pub fn classify_probe(outcome: &ProbeOutcome) -> ProbeVerdict {
    match outcome {
        ProbeOutcome::Status(STATUS_UNAUTHORIZED) => ProbeVerdict::Rejected,
        ProbeOutcome::Status(STATUS_METHOD_NOT_ALLOWED) => ProbeVerdict::Accepted,
        ProbeOutcome::Status(_) | ProbeOutcome::Transport(_) | ProbeOutcome::TimedOut => {
            ProbeVerdict::AdmittedUnverified
        }
    }
}

/// User-visible session message left by the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    /// Login probe returned 401.
    InvalidCredentials,
    /// An authenticated call returned 401.
    SessionExpired,
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => f.write_str("invalid credentials"),
            Self::SessionExpired => f.write_str("session expired"),
        }
    }
}

/// Transport used to probe credentials against the remote API.
pub trait AuthTransport: Send + Sync {
    /// Issues the lightweight validation request carrying `token`.
    fn probe(&self, token: &AuthToken) -> ProbeOutcome;
}

/// Outstanding login probe to be sent by the caller's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginProbe {
    token: AuthToken,
}

impl LoginProbe {
    /// Token the probe must carry.
    pub fn token(&self) -> &AuthToken {
        &self.token
    }
}

/// Owner of the session state machine.
pub struct SessionManager {
    state: SessionState,
    pending: Option<AuthToken>,
    notice: Option<SessionNotice>,
    store: Arc<dyn PreferenceStore>,
}

impl SessionManager {
    /// Restores the session from `store`.
    ///
    /// A persisted token is trusted without re-validation until an
    /// authenticated call proves it invalid.
    pub fn restore(store: Arc<dyn PreferenceStore>) -> Self {
        let state = match store.get(AUTH_HEADER_KEY).and_then(AuthToken::from_persisted) {
            Some(token) => {
                tracing::info!("restored persisted session");
                SessionState::Authenticated(token)
            }
            None => SessionState::Anonymous,
        };

        Self {
            state,
            pending: None,
            notice: None,
            store,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the active token when authenticated.
    pub fn token(&self) -> Option<&AuthToken> {
        match &self.state {
            SessionState::Authenticated(token) => Some(token),
            SessionState::Anonymous | SessionState::Authenticating => None,
        }
    }

    /// Returns `true` when a token is active.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Returns the user-visible message of the last transition, if any.
    pub fn notice(&self) -> Option<SessionNotice> {
        self.notice
    }

    /// Validates input and starts a login probe.
    ///
    /// # Errors
    /// Returns [`AuthError::EmptyCredential`] or [`AuthError::InvalidIdentifier`]
    /// without changing state, and [`AuthError::LoginInFlight`] while another
    /// probe is outstanding.
    pub fn begin_login(&mut self, identifier: &str, secret: &str) -> Result<LoginProbe, AuthError> {
        if matches!(self.state, SessionState::Authenticating) {
            return Err(AuthError::LoginInFlight);
        }

        let credentials = Credentials::new(identifier, secret);
        credentials.validate()?;

        let token = AuthToken::from_credentials(&credentials);
        self.pending = Some(token.clone());
        self.notice = None;
        self.state = SessionState::Authenticating;
        tracing::info!(identifier = %credentials.identifier, "login probe started");

        Ok(LoginProbe { token })
    }

    /// Applies the probe outcome of the outstanding login.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] for a 401 (state becomes
    /// `Anonymous` and any persisted token is removed) and [`AuthError::NoLoginInFlight`] when no probe is
    /// outstanding.
    pub fn complete_login(&mut self, outcome: ProbeOutcome) -> Result<ProbeVerdict, AuthError> {
        let token = match (&self.state, self.pending.take()) {
            (SessionState::Authenticating, Some(token)) => token,
            _ => return Err(AuthError::NoLoginInFlight),
        };

        let verdict = classify_probe(&outcome);
        match verdict {
            ProbeVerdict::Rejected => {
                tracing::info!("login rejected by server");
                self.clear_session();
                self.notice = Some(SessionNotice::InvalidCredentials);
                return Err(AuthError::InvalidCredentials);
            }
            ProbeVerdict::Accepted => tracing::info!("login accepted"),
            ProbeVerdict::AdmittedUnverified => {
                tracing::warn!(?outcome, "login probe inconclusive; admitting session unverified");
            }
        }

        if let Err(error) = self.store.set(AUTH_HEADER_KEY, token.header_value()) {
            tracing::warn!(%error, "session token not persisted");
        }
        self.state = SessionState::Authenticated(token);
        Ok(verdict)
    }

    /// Runs both login phases through `transport`.
    ///
    /// # Errors
    /// See [`SessionManager::begin_login`] and [`SessionManager::complete_login`].
    pub fn login(
        &mut self,
        identifier: &str,
        secret: &str,
        transport: &dyn AuthTransport,
    ) -> Result<ProbeVerdict, AuthError> {
        let probe = self.begin_login(identifier, secret)?;
        let outcome = transport.probe(probe.token());
        self.complete_login(outcome)
    }

    /// Ends the session and clears the persisted token.
    pub fn logout(&mut self) {
        self.clear_session();
        self.notice = None;
        tracing::info!("logged out");
    }

    /// Ends the session after an authenticated call returned 401.
    pub fn on_unauthorized(&mut self) {
        self.clear_session();
        self.notice = Some(SessionNotice::SessionExpired);
        tracing::warn!("session rejected by server; logged out");
    }

    fn clear_session(&mut self) {
        self.state = SessionState::Anonymous;
        self.pending = None;
        if let Err(error) = self.store.remove(AUTH_HEADER_KEY) {
            tracing::warn!(%error, "persisted session token not cleared");
        }
    }
}

/// Errors produced by session logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Identifier or secret is blank.
    #[error("identifier and secret must be non-empty")]
    EmptyCredential,
    /// Identifier cannot be encoded in a Basic credential.
    #[error("identifier must not contain ':'")]
    InvalidIdentifier,
    /// Another login probe is outstanding.
    #[error("a login attempt is already in progress")]
    LoginInFlight,
    /// A probe outcome arrived with no login outstanding.
    #[error("no login attempt is in progress")]
    NoLoginInFlight,
    /// Server rejected the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,
}

#[cfg(test)]
mod tests {
    //! Unit tests for token encoding and probe classification.

    use chemviz_prefs::MemoryPreferenceStore;

    use super::*;

    #[test]
    fn encodes_basic_token() {
        let token = AuthToken::from_credentials(&Credentials::new("admin", "password123"));
        assert_eq!(token.header_value(), "Basic YWRtaW46cGFzc3dvcmQxMjM=");
        assert_eq!(format!("{token:?}"), "AuthToken(<redacted>)");
    }

    #[test]
    fn equal_credentials_yield_equal_tokens() {
        let a = AuthToken::from_credentials(&Credentials::new("op", "s3cret"));
        let b = AuthToken::from_credentials(&Credentials::new("op", "s3cret"));
        let c = AuthToken::from_credentials(&Credentials::new("op", "other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", Credentials::new("admin", "password123"));
        assert!(!rendered.contains("password123"));
    }

    #[test]
    fn classifies_probe_outcomes() {
        assert_eq!(classify_probe(&ProbeOutcome::Status(401)), ProbeVerdict::Rejected);
        assert_eq!(classify_probe(&ProbeOutcome::Status(405)), ProbeVerdict::Accepted);
        for outcome in [
            ProbeOutcome::Status(200),
            ProbeOutcome::Status(403),
            ProbeOutcome::Status(500),
            ProbeOutcome::Transport("connection refused".to_string()),
            ProbeOutcome::TimedOut,
        ] {
            assert_eq!(classify_probe(&outcome), ProbeVerdict::AdmittedUnverified);
        }
    }

    #[test]
    fn second_login_is_rejected_while_probe_outstanding() {
        let mut session = SessionManager::restore(Arc::new(MemoryPreferenceStore::new()));
        session.begin_login("admin", "a").expect("first login should start");
        assert_eq!(
            session.begin_login("admin", "b"),
            Err(AuthError::LoginInFlight)
        );
    }

    #[test]
    fn stray_probe_outcome_is_ignored() {
        let mut session = SessionManager::restore(Arc::new(MemoryPreferenceStore::new()));
        assert_eq!(
            session.complete_login(ProbeOutcome::Status(405)),
            Err(AuthError::NoLoginInFlight)
        );
        assert_eq!(session.state(), &SessionState::Anonymous);
    }
}
