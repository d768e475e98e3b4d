use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::core::client::GameClient;
use crate::core::error::{LauncherError, LauncherResult};

use super::model::Module;

/// Performs module install/uninstall as a unit of file + bookkeeping
/// change, and enforces the per-installation uniqueness invariant.
#[derive(Debug, Default)]
pub struct ModuleManager;

impl ModuleManager {
    pub fn new() -> Self {
        Self
    }

    /// Install `module` into `client`, copying its files from
    /// `source_dir` into the installation's module directory.
    ///
    /// Fails with `DuplicateModule` if the id is already present; upgrade
    /// means uninstall then install. The bookkeeping entry is appended
    /// only after every file copy succeeded; a copy failure rolls back
    /// the files already written and leaves the module set unchanged.
    pub async fn install(
        &self,
        client: &mut GameClient,
        module: Module,
        source_dir: &Path,
    ) -> LauncherResult<()> {
        if client.has_module(&module.id) {
            return Err(LauncherError::DuplicateModule(module.id));
        }

        let dest_root = client.modules_dir();
        let mut copied = Vec::new();

        for rel in &module.files {
            let src = source_dir.join(rel);
            let dest = dest_root.join(rel);

            let result = async {
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|source| LauncherError::Io {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                }
                tokio::fs::copy(&src, &dest)
                    .await
                    .map_err(|source| LauncherError::Io {
                        path: src.clone(),
                        source,
                    })?;
                Ok::<_, LauncherError>(())
            }
            .await;

            if let Err(e) = result {
                // No partial registration: undo the files written so far.
                for written in &copied {
                    if let Err(cleanup) = tokio::fs::remove_file(written).await {
                        warn!("Rollback could not remove {:?}: {}", written, cleanup);
                    }
                }
                return Err(e);
            }

            copied.push(dest);
        }

        info!("Installed module {} into {}", module, client);
        client.installed_modules.push(module);
        Ok(())
    }

    /// Remove the module with `module_id` from `client`, deleting its
    /// recorded files first. Already-missing files are tolerated so a
    /// half-finished uninstall can be retried.
    pub async fn uninstall(&self, client: &mut GameClient, module_id: &str) -> LauncherResult<()> {
        let index = client
            .installed_modules
            .iter()
            .position(|m| m.id == module_id)
            .ok_or_else(|| LauncherError::ModuleNotFound(module_id.to_string()))?;

        let dest_root = client.modules_dir();
        for rel in &client.installed_modules[index].files {
            let path = dest_root.join(rel);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(LauncherError::Io { path, source }),
            }
        }

        let removed = client.installed_modules.remove(index);
        info!("Uninstalled module {} from {}", removed, client);
        Ok(())
    }

    /// Collapse accidental duplicate module ids, keeping the first-seen
    /// entry. Defensive normalization after external data import.
    pub fn deduplicate(&self, client: &mut GameClient) {
        let before = client.installed_modules.len();
        let mut seen = HashSet::new();
        client
            .installed_modules
            .retain(|m| seen.insert(m.id.clone()));

        let dropped = before - client.installed_modules.len();
        if dropped > 0 {
            warn!("Dropped {} duplicate module entries from {}", dropped, client);
        }
    }
}
