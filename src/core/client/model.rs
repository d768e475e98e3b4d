use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::modules::Module;

/// Validation state of an installation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Discovered or registered but not yet checked.
    Unvalidated,
    /// Executable and support files present and matching.
    Valid,
    /// Executable is gone; the registry drops such entries.
    MissingFile,
    /// Executable present but its size/hash no longer matches.
    Corrupt,
}

/// One on-disk copy of the game client the launcher knows about.
///
/// Identity is the absolute executable path. Each installation owns its
/// attached module set; module ids within that set are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameClient {
    /// Absolute path to the client executable. Identity, immutable.
    pub executable: PathBuf,
    /// Per-installation configuration directory.
    pub config_dir: PathBuf,
    pub version: Option<String>,
    pub validation: ValidationStatus,
    /// Modules attached to this installation, insertion-ordered.
    pub installed_modules: Vec<Module>,

    // ── Integrity baseline, recorded on first successful validation ──
    pub expected_size: Option<u64>,
    pub expected_sha256: Option<String>,

    pub registered_at: DateTime<Utc>,
}

impl GameClient {
    pub fn new(executable: PathBuf) -> Self {
        let config_dir = executable
            .parent()
            .map(|p| p.join("config"))
            .unwrap_or_else(|| PathBuf::from("config"));

        Self {
            executable,
            config_dir,
            version: None,
            validation: ValidationStatus::Unvalidated,
            installed_modules: Vec::new(),
            expected_size: None,
            expected_sha256: None,
            registered_at: Utc::now(),
        }
    }

    /// Directory module files are installed into.
    pub fn modules_dir(&self) -> PathBuf {
        self.executable
            .parent()
            .map(|p| p.join("modules"))
            .unwrap_or_else(|| PathBuf::from("modules"))
    }

    pub fn has_module(&self, module_id: &str) -> bool {
        self.installed_modules.iter().any(|m| m.id == module_id)
    }
}

impl std::fmt::Display for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.executable.display())
    }
}
