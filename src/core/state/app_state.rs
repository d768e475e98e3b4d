use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::client::ClientRegistry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::launch::{validate_loadout, Loadout, ProcessSupervisor};
use crate::core::server::{ServerAddress, ServerDirectory};

const APP_DIR_NAME: &str = "Vanguard";
const SETTINGS_FILE: &str = "launcher_settings.json";
const CLIENTS_FILE: &str = "clients.json";
const SERVERS_FILE: &str = "servers.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    /// Server preselected in the launcher UI.
    pub default_server: Option<ServerAddress>,
    /// Installation used when an invocation does not name one.
    pub default_client: Option<PathBuf>,
    /// Restrict each installation to one simultaneous instance.
    pub one_instance_per_client: bool,
    /// Hosted server-list document refreshed at startup, if any.
    pub server_list_url: Option<String>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            default_server: None,
            default_client: None,
            one_instance_per_client: true,
            server_list_url: None,
        }
    }
}

/// One process-wide owned store, created at startup and flushed at
/// shutdown. Components receive it by reference; there is no ambient
/// global state.
pub struct AppState {
    pub data_dir: PathBuf,
    pub registry: ClientRegistry,
    pub directory: ServerDirectory,
    pub supervisor: ProcessSupervisor,
    pub http_client: Client,
    settings: RwLock<LauncherSettings>,
}

impl AppState {
    pub fn new(data_dir: PathBuf) -> LauncherResult<Self> {
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();

        let http_client = build_http_client()?;
        let registry = ClientRegistry::new(data_dir.join(CLIENTS_FILE));
        let directory = ServerDirectory::new(data_dir.join(SERVERS_FILE));
        let supervisor = ProcessSupervisor::new(settings.one_instance_per_client);

        Ok(Self {
            data_dir,
            registry,
            directory,
            supervisor,
            http_client,
            settings: RwLock::new(settings),
        })
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    // ── Startup / shutdown ──────────────────────────────

    /// Bring the stores up: load persisted documents, re-announce the
    /// default server list, validate installations, pick a default
    /// server if none is configured, and run the first probe round.
    pub async fn startup(&self) -> LauncherResult<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.data_dir.clone(),
                source,
            })?;

        self.registry.load().await?;
        self.directory.load().await?;

        self.directory.sync_default_servers().await;
        let list_url = self.settings.read().await.server_list_url.clone();
        if let Some(url) = list_url {
            self.directory
                .fetch_remote_servers(&self.http_client, &url)
                .await;
        }

        self.registry.validate_all().await;

        // A configured default client must still be registered.
        let default_client = self.settings.read().await.default_client.clone();
        if let Some(path) = default_client {
            if self.registry.get(&path).await.is_none() {
                warn!("Configured default client {:?} is gone; clearing", path);
                self.settings.write().await.default_client = None;
            }
        }

        if self.settings.read().await.default_server.is_none() {
            if let Some(first) = self.directory.list_visible().await.first() {
                info!("Selecting {} as the default server", first.address);
                self.settings.write().await.default_server = Some(first.address.clone());
            }
        }

        // First round always runs: the directory starts with the
        // never-probed sentinel.
        self.directory.probe_all(false).await;

        self.flush().await
    }

    /// Persist every store. Called at shutdown and after operations
    /// that change durable state.
    pub async fn flush(&self) -> LauncherResult<()> {
        self.registry.save().await?;
        self.directory.save().await?;
        self.save_settings().await
    }

    /// Teardown: terminate supervised processes within `grace`, then
    /// flush. Never fails the shutdown path.
    pub async fn shutdown(&self, grace: Duration) {
        self.supervisor.force_close_all(grace).await;
        if let Err(e) = self.flush().await {
            warn!("State flush during shutdown failed: {}", e);
        }
    }

    // ── Settings ────────────────────────────────────────

    pub async fn settings(&self) -> LauncherSettings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, settings: LauncherSettings) -> LauncherResult<()> {
        *self.settings.write().await = settings;
        self.save_settings().await
    }

    async fn save_settings(&self) -> LauncherResult<()> {
        let settings = self.settings.read().await;
        let json = serde_json::to_string_pretty(&*settings)?;
        let path = self.data_dir.join(SETTINGS_FILE);
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| LauncherError::Io { path, source })
    }

    // ── Launch orchestration ────────────────────────────

    /// Launch a registered installation against a server, checking the
    /// loadout against the server's declared ruleset first.
    ///
    /// A refused spawn triggers a re-validation of the installation so
    /// the registry catches an executable deleted behind its back.
    pub async fn launch_client(
        &self,
        client_path: &Path,
        server_address: Option<&ServerAddress>,
        loadout: Option<&Loadout>,
        extra_args: &[String],
    ) -> LauncherResult<Uuid> {
        let client = self
            .registry
            .get(client_path)
            .await
            .ok_or_else(|| LauncherError::ClientNotRegistered(client_path.display().to_string()))?;

        let server = match server_address {
            Some(address) => Some(self.directory.get(address).await.ok_or_else(|| {
                LauncherError::Other(format!("unknown server {}", address))
            })?),
            None => None,
        };

        if let (Some(loadout), Some(server)) = (loadout, server.as_ref()) {
            validate_loadout(loadout, server)?;
        }

        let result = self
            .supervisor
            .launch(&client, server.as_ref(), extra_args)
            .await;

        if matches!(result, Err(LauncherError::LaunchFailed(_))) {
            if let Err(e) = self.registry.validate(client_path).await {
                warn!("Post-failure revalidation of {:?} failed: {}", client_path, e);
            }
        }

        result
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
