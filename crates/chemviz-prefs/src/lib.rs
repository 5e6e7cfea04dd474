#![warn(missing_docs)]
//! # chemviz-prefs
//!
//! ## Purpose
//! Provides the durable preference store and the theme controller built on it.
//!
//! ## Responsibilities
//! - Define the key/value [`PreferenceStore`] capability and two backends
//!   (in-memory and JSON file).
//! - Model the ambient theme query and the visual root as injectable traits.
//! - Resolve, apply, toggle and persist the light/dark preference.
//!
//! ## Data flow
//! Startup: store `theme` key (or [`AmbientTheme`]) -> [`ThemeController`] ->
//! [`ThemeSurface::apply`]. Toggle: current mode -> flipped -> surface + store.
//!
//! ## Ownership and lifetimes
//! Stores are shared behind `Arc<dyn PreferenceStore>` between the theme
//! controller and the session manager; each writes its own keys, and stores
//! guard their map with a `Mutex` so readers see a consistent snapshot.
//!
//! ## Error model
//! Backends return [`PreferenceError`]. The theme controller treats
//! persistence as best-effort and only logs failures.
//!
//! ## Security and privacy notes
//! The JSON file backend stores values as plain text, including the auth
//! header written by the session manager.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chemviz_core::ThemePreference;
use thiserror::Error;

/// Store key holding `"light"` or `"dark"`.
pub const THEME_KEY: &str = "theme";

/// Durable key/value capability shared by controllers.
pub trait PreferenceStore: Send + Sync {
    /// Reads one value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes one value.
    ///
    /// # Errors
    /// Returns [`PreferenceError`] when the backend cannot persist the value.
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;

    /// Deletes one value; removing an absent key succeeds.
    ///
    /// # Errors
    /// Returns [`PreferenceError`] when the backend cannot persist the removal.
    fn remove(&self, key: &str) -> Result<(), PreferenceError>;
}

/// Process-local store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut entries = self.entries.lock().map_err(|_| PreferenceError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        let mut entries = self.entries.lock().map_err(|_| PreferenceError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one flat JSON object on disk.
///
/// Every mutation rewrites the file through a temporary sibling and an atomic
/// rename, so a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFilePreferenceStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store. So is a file that is not a flat JSON
    /// string map; it is replaced on the next write.
    ///
    /// # Errors
    /// Returns [`PreferenceError::Io`] when the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "preference file unreadable; starting empty"
                );
                BTreeMap::new()
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(PreferenceError::Io { path, source }),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), PreferenceError> {
        let mut entries = self.entries.lock().map_err(|_| PreferenceError::Poisoned)?;
        let mut next = entries.clone();
        apply(&mut next);
        write_atomically(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

fn write_atomically(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
    let io_error = |source| PreferenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let encoded = serde_json::to_vec_pretty(entries).map_err(PreferenceError::Codec)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, encoded).map_err(io_error)?;
    fs::rename(&tmp_path, path).map_err(io_error)
}

/// Ambient (system/environment) theme query.
pub trait AmbientTheme: Send + Sync {
    /// Returns `true` when the environment asks for dark mode.
    fn prefers_dark(&self) -> bool;
}

/// Ambient preference fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAmbient(pub ThemePreference);

impl AmbientTheme for FixedAmbient {
    fn prefers_dark(&self) -> bool {
        self.0.is_dark()
    }
}

/// Ambient preference derived from the terminal's `COLORFGBG` variable.
///
/// The last `;`-separated field is the background palette index; indices
/// 0-6 and 8 are dark backgrounds. Missing or unparseable values mean light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalAmbient {
    colorfgbg: Option<String>,
}

impl TerminalAmbient {
    /// Reads `COLORFGBG` from the process environment.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var("COLORFGBG").ok())
    }

    /// Uses an explicit `COLORFGBG` value.
    pub fn from_value(colorfgbg: Option<String>) -> Self {
        Self { colorfgbg }
    }
}

impl AmbientTheme for TerminalAmbient {
    fn prefers_dark(&self) -> bool {
        self.colorfgbg
            .as_deref()
            .and_then(|value| value.rsplit(';').next())
            .and_then(|background| background.trim().parse::<u8>().ok())
            .is_some_and(|background| background < 7 || background == 8)
    }
}

/// Visual root that renders in light or dark mode.
pub trait ThemeSurface: Send + Sync {
    /// Switches the rendered mode.
    fn apply(&self, theme: ThemePreference);
}

/// Surface that remembers the last applied mode for a renderer to read.
#[derive(Debug, Default)]
pub struct ThemeCell {
    current: Mutex<Option<ThemePreference>>,
}

impl ThemeCell {
    /// Creates a surface with nothing applied yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last applied mode.
    pub fn current(&self) -> Option<ThemePreference> {
        self.current.lock().ok().and_then(|current| *current)
    }
}

impl ThemeSurface for ThemeCell {
    fn apply(&self, theme: ThemePreference) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(theme);
        }
    }
}

/// Resolves, applies and persists the light/dark preference.
#[derive(Clone)]
pub struct ThemeController {
    store: Arc<dyn PreferenceStore>,
    surface: Arc<dyn ThemeSurface>,
}

impl ThemeController {
    /// Creates a controller over a shared store and visual root.
    pub fn new(store: Arc<dyn PreferenceStore>, surface: Arc<dyn ThemeSurface>) -> Self {
        Self { store, surface }
    }

    /// Resolves the startup mode and applies it.
    ///
    /// A persisted `theme` value wins; otherwise `ambient` decides. The
    /// ambient fallback is not written back to the store.
    pub fn initialize(&self, ambient: &dyn AmbientTheme) -> ThemePreference {
        let theme = self
            .persisted()
            .unwrap_or_else(|| {
                if ambient.prefers_dark() {
                    ThemePreference::Dark
                } else {
                    ThemePreference::Light
                }
            });
        self.surface.apply(theme);
        theme
    }

    /// Flips `current`, applies and persists the result, and returns it.
    pub fn toggle(&self, current: ThemePreference) -> ThemePreference {
        let next = current.toggled();
        self.surface.apply(next);
        if let Err(error) = self.store.set(THEME_KEY, next.as_str()) {
            tracing::debug!(%error, "theme preference not persisted");
        }
        next
    }

    /// Returns the persisted preference, if any.
    ///
    /// A stored value other than `"light"` or `"dark"` reads as light; only an
    /// absent or empty value defers to the ambient preference.
    pub fn persisted(&self) -> Option<ThemePreference> {
        let raw = self.store.get(THEME_KEY).filter(|raw| !raw.is_empty())?;
        Some(ThemePreference::from_persisted(&raw).unwrap_or_else(|| {
            tracing::debug!(value = %raw, "unrecognised theme value; using light");
            ThemePreference::Light
        }))
    }
}

/// Preference store failures.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Backing file could not be read or written.
    #[error("preference file {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Backing document is not a flat JSON string map.
    #[error("preference codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// A previous writer panicked while holding the store lock.
    #[error("preference store lock poisoned")]
    Poisoned,
}
