use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::modules::{Module, ModuleManager};

use super::model::{GameClient, ValidationStatus};

/// Owns the set of known client installations.
///
/// All writes go through the inner lock, so concurrent module installs or
/// register/unregister calls on the same installation are serialized.
/// The list persists to `clients.json` in the launcher data directory.
pub struct ClientRegistry {
    clients: RwLock<Vec<GameClient>>,
    store_path: PathBuf,
    modules: ModuleManager,
}

impl ClientRegistry {
    pub fn new(store_path: PathBuf) -> Self {
        Self {
            clients: RwLock::new(Vec::new()),
            store_path,
            modules: ModuleManager::new(),
        }
    }

    /// Load the persisted registry, skipping nothing: a corrupt document
    /// is logged and treated as an empty registry rather than fatal.
    pub async fn load(&self) -> LauncherResult<()> {
        if !self.store_path.exists() {
            return Ok(());
        }

        let raw = tokio::fs::read_to_string(&self.store_path)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.store_path.clone(),
                source,
            })?;

        match serde_json::from_str::<Vec<GameClient>>(&raw) {
            Ok(loaded) => {
                let mut clients = self.clients.write().await;
                *clients = loaded;
                info!("Loaded {} client installations", clients.len());
            }
            Err(e) => warn!("Corrupt client registry at {:?}: {}", self.store_path, e),
        }

        Ok(())
    }

    pub async fn save(&self) -> LauncherResult<()> {
        let clients = self.clients.read().await;
        let json = serde_json::to_string_pretty(&*clients)?;

        if let Some(parent) = self.store_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&self.store_path, json)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.store_path.clone(),
                source,
            })
    }

    // ── Discovery & registration ────────────────────────

    /// Check each candidate path for a client executable and register the
    /// ones that exist and are not already known. Newly discovered
    /// installations start `Unvalidated` and are picked up by the next
    /// validation pass. Returns how many were added.
    pub async fn scan(&self, candidate_paths: &[PathBuf]) -> usize {
        let mut clients = self.clients.write().await;
        let mut added = 0;

        for candidate in candidate_paths {
            if !candidate.is_file() {
                continue;
            }
            if clients.iter().any(|c| c.executable == *candidate) {
                continue;
            }
            info!("Discovered client installation at {:?}", candidate);
            clients.push(GameClient::new(candidate.clone()));
            added += 1;
        }

        added
    }

    /// Explicit user-driven add. Returns false if the path was already
    /// registered.
    pub async fn register(&self, path: &Path) -> LauncherResult<bool> {
        if !path.is_file() {
            return Err(LauncherError::InstallationInvalid {
                path: path.to_path_buf(),
                reason: "executable not found".into(),
            });
        }

        let mut clients = self.clients.write().await;
        if clients.iter().any(|c| c.executable == path) {
            return Ok(false);
        }

        clients.push(GameClient::new(path.to_path_buf()));
        info!("Registered client installation at {:?}", path);
        Ok(true)
    }

    pub async fn unregister(&self, path: &Path) -> LauncherResult<()> {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|c| c.executable != path);

        if clients.len() == before {
            return Err(LauncherError::ClientNotRegistered(
                path.display().to_string(),
            ));
        }
        info!("Unregistered client installation at {:?}", path);
        Ok(())
    }

    // ── Validation ──────────────────────────────────────

    /// Validate one installation in place.
    ///
    /// Missing executables remove the entry from the registry entirely;
    /// a present-but-mismatching executable stays listed as `Corrupt` so
    /// the user can repair it. The first successful validation records
    /// the size/hash baseline later passes compare against.
    pub async fn validate(&self, path: &Path) -> LauncherResult<ValidationStatus> {
        let mut clients = self.clients.write().await;
        let index = clients
            .iter()
            .position(|c| c.executable == path)
            .ok_or_else(|| LauncherError::ClientNotRegistered(path.display().to_string()))?;

        let status = check_installation(&mut clients[index]).await;
        if status == ValidationStatus::MissingFile {
            warn!("Removing installation with missing executable: {:?}", path);
            clients.remove(index);
        }
        Ok(status)
    }

    /// Startup enumeration pass: revalidate every installation, drop the
    /// ones whose executable is gone, and normalize module sets that may
    /// have picked up duplicates through external data import.
    pub async fn validate_all(&self) {
        let mut clients = self.clients.write().await;

        let mut i = 0;
        while i < clients.len() {
            let status = check_installation(&mut clients[i]).await;
            if status == ValidationStatus::MissingFile {
                warn!(
                    "Removing installation with missing executable: {:?}",
                    clients[i].executable
                );
                clients.remove(i);
                continue;
            }

            self.modules.deduplicate(&mut clients[i]);
            i += 1;
        }

        info!("Validated {} client installations", clients.len());
    }

    // ── Modules ─────────────────────────────────────────

    pub async fn install_module(
        &self,
        path: &Path,
        module: Module,
        source_dir: &Path,
    ) -> LauncherResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients
            .iter_mut()
            .find(|c| c.executable == path)
            .ok_or_else(|| LauncherError::ClientNotRegistered(path.display().to_string()))?;

        self.modules.install(client, module, source_dir).await
    }

    pub async fn uninstall_module(&self, path: &Path, module_id: &str) -> LauncherResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients
            .iter_mut()
            .find(|c| c.executable == path)
            .ok_or_else(|| LauncherError::ClientNotRegistered(path.display().to_string()))?;

        self.modules.uninstall(client, module_id).await
    }

    // ── Queries ─────────────────────────────────────────

    pub async fn get(&self, path: &Path) -> Option<GameClient> {
        let clients = self.clients.read().await;
        clients.iter().find(|c| c.executable == path).cloned()
    }

    pub async fn list(&self) -> Vec<GameClient> {
        self.clients.read().await.clone()
    }
}

/// Run the exists/size/hash checks against one installation and update
/// its status in place. Size and SHA-256 are proxies for "matches the
/// executable we validated before".
async fn check_installation(client: &mut GameClient) -> ValidationStatus {
    let metadata = match tokio::fs::metadata(&client.executable).await {
        Ok(m) if m.is_file() => m,
        _ => {
            client.validation = ValidationStatus::MissingFile;
            return ValidationStatus::MissingFile;
        }
    };

    let bytes = match tokio::fs::read(&client.executable).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Cannot read {:?} for validation: {}", client.executable, e);
            client.validation = ValidationStatus::Corrupt;
            return ValidationStatus::Corrupt;
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let status = match (&client.expected_size, &client.expected_sha256) {
        (Some(size), Some(sha)) => {
            if *size == metadata.len() && *sha == digest {
                ValidationStatus::Valid
            } else {
                ValidationStatus::Corrupt
            }
        }
        _ => {
            // First validation establishes the baseline.
            client.expected_size = Some(metadata.len());
            client.expected_sha256 = Some(digest);
            ValidationStatus::Valid
        }
    };

    client.validation = status;
    status
}
