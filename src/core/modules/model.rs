use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An optional client-side content/patch package attached to one
/// installation. Identity is the stable `id`; everything else is
/// incidental metadata.
///
/// Modules are only ever created and removed through
/// [`ModuleManager`](super::ModuleManager) install/uninstall so that the
/// bookkeeping entry and the files on disk move together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub display_name: String,
    pub version: String,
    /// Files this module installs, relative to the installation's
    /// module directory. Recorded at install time so uninstall can
    /// reverse exactly what was written.
    pub files: Vec<PathBuf>,
}

impl Module {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        version: impl Into<String>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            version: version.into(),
            files,
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} ({})", self.display_name, self.version, self.id)
    }
}
