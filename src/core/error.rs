use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Probe timed out for {0}")]
    ProbeTimeout(String),

    // ── Modules ─────────────────────────────────────────
    #[error("Module already installed: {0}")]
    DuplicateModule(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    // ── Clients ─────────────────────────────────────────
    #[error("Installation invalid at {path:?}: {reason}")]
    InstallationInvalid { path: PathBuf, reason: String },

    #[error("Client not registered: {0}")]
    ClientNotRegistered(String),

    // ── Launch ──────────────────────────────────────────
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    #[error("Client already running: {0}")]
    AlreadyRunning(String),

    #[error("Loadout rejected: {0}")]
    ValidationRejected(String),

    // ── Instance channel ────────────────────────────────
    #[error("Instance channel unavailable: {0}")]
    ChannelUnavailable(String),

    // ── Deep links ──────────────────────────────────────
    #[error("Malformed deep-link payload: {0}")]
    DeepLink(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
