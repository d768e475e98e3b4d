// ─── Process Supervisor ───
// Launches client installations and tracks the resulting OS processes.
// One watcher task per running instance; the watcher is the single
// point of removal, so a force-close racing a natural exit still
// removes each entry exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::Child;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::client::GameClient;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::server::{Server, ServerAddress};

use super::task::build_launch_command;

const WAIT_RETRY_INITIAL: Duration = Duration::from_millis(100);
const WAIT_RETRY_MAX: Duration = Duration::from_secs(2);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Lifecycle of one supervised process.
///
/// `Launching` covers OS process creation; `Running` once the spawn is
/// confirmed; `Exited` is terminal and removes the entry from the
/// active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Launching,
    Running,
    Exited(Option<i32>),
}

/// Read-only snapshot of a tracked instance.
#[derive(Debug, Clone)]
pub struct RunningInstance {
    pub id: Uuid,
    pub pid: Option<u32>,
    pub client: PathBuf,
    pub server: Option<ServerAddress>,
    pub started_at: DateTime<Utc>,
    pub status: InstanceStatus,
}

struct TrackedInstance {
    info: RunningInstance,
    kill_tx: watch::Sender<bool>,
}

/// Owns the running-set. Instances are registered at launch and removed
/// by their watcher the moment exit is observed; nothing outside this
/// type holds a long-lived reference to a tracked process.
pub struct ProcessSupervisor {
    running: Arc<Mutex<HashMap<Uuid, TrackedInstance>>>,
    /// Restrict each installation to one simultaneous instance.
    one_instance_per_client: bool,
}

impl ProcessSupervisor {
    pub fn new(one_instance_per_client: bool) -> Self {
        Self {
            running: Arc::new(Mutex::new(HashMap::new())),
            one_instance_per_client,
        }
    }

    /// Launch `client`, optionally pointed at `server`, and begin
    /// watching for process exit in the background.
    ///
    /// Fails with `AlreadyRunning` when the single-instance policy is on
    /// and the installation already has a tracked instance, or with
    /// `LaunchFailed` when the OS refuses to start the process (the
    /// caller should revalidate the installation in that case).
    pub async fn launch(
        &self,
        client: &GameClient,
        server: Option<&Server>,
        extra_args: &[String],
    ) -> LauncherResult<Uuid> {
        if !client.executable.is_file() {
            return Err(LauncherError::LaunchFailed(format!(
                "executable missing at {:?}",
                client.executable
            )));
        }

        let id = Uuid::new_v4();
        let (kill_tx, kill_rx) = watch::channel(false);

        {
            let mut running = self.running.lock().await;

            if self.one_instance_per_client
                && running
                    .values()
                    .any(|t| t.info.client == client.executable)
            {
                return Err(LauncherError::AlreadyRunning(
                    client.executable.display().to_string(),
                ));
            }

            running.insert(
                id,
                TrackedInstance {
                    info: RunningInstance {
                        id,
                        pid: None,
                        client: client.executable.clone(),
                        server: server.map(|s| s.address.clone()),
                        started_at: Utc::now(),
                        status: InstanceStatus::Launching,
                    },
                    kill_tx,
                },
            );
        }

        let mut cmd = tokio::process::Command::from(build_launch_command(
            client, server, extra_args,
        ));

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.running.lock().await.remove(&id);
                return Err(LauncherError::LaunchFailed(e.to_string()));
            }
        };

        let pid = child.id();
        {
            let mut running = self.running.lock().await;
            // Entry is still present: only the watcher removes entries
            // and it has not been spawned yet.
            if let Some(tracked) = running.get_mut(&id) {
                tracked.info.pid = pid;
                tracked.info.status = InstanceStatus::Running;
            }
        }

        info!(
            "Launched {} (pid {:?}) against {:?}",
            client,
            pid,
            server.map(|s| s.address.to_string())
        );

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let code = watch_child(child, kill_rx).await;
            // Single point of removal; at most one logical removal can
            // take effect even if a force-close raced the exit.
            if running.lock().await.remove(&id).is_some() {
                info!("Instance {} exited with code {:?}", id, code);
            }
        });

        Ok(id)
    }

    /// Read-only snapshot of every tracked instance.
    pub async fn running_instances(&self) -> Vec<RunningInstance> {
        let running = self.running.lock().await;
        running.values().map(|t| t.info.clone()).collect()
    }

    /// Is `client` currently connected to `server`?
    pub async fn is_connected(&self, client: &Path, server: &ServerAddress) -> bool {
        let running = self.running.lock().await;
        running.values().any(|t| {
            t.info.client == client && t.info.server.as_ref() == Some(server)
        })
    }

    /// Best-effort termination of every tracked instance, bounded by
    /// `grace`. Instances that refuse to die within the grace period
    /// are reported, never fatal: this runs on the shutdown path.
    pub async fn force_close_all(&self, grace: Duration) {
        {
            let running = self.running.lock().await;
            if running.is_empty() {
                return;
            }
            info!("Force-closing {} running instance(s)", running.len());
            for tracked in running.values() {
                tracked.kill_tx.send_replace(true);
            }
        }

        let deadline = Instant::now() + grace;
        loop {
            if self.running.lock().await.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }

        let leftover = self.running.lock().await.len();
        if leftover > 0 {
            warn!(
                "{} instance(s) still tracked after the {}s grace period; abandoning them",
                leftover,
                grace.as_secs()
            );
        }
    }
}

/// Wait for `child` to exit, killing it if the supervisor asks.
///
/// OS wait errors are retried with backoff instead of abandoning the
/// watch; a kill request falls through to a final wait so the exit is
/// still observed exactly once.
async fn watch_child(mut child: Child, mut kill_rx: watch::Receiver<bool>) -> Option<i32> {
    let mut backoff = WAIT_RETRY_INITIAL;

    loop {
        // Handlers only produce a verdict; `child` is touched again only
        // after the select completes and its wait future is dropped.
        let kill_requested = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => return status.code(),
                Err(e) => {
                    warn!("Process wait error, retrying in {:?}: {}", backoff, e);
                    None
                }
            },
            changed = kill_rx.changed() => {
                Some(changed.is_ok() && *kill_rx.borrow_and_update())
            }
        };

        match kill_requested {
            Some(true) => {
                if let Err(e) = child.start_kill() {
                    warn!("Kill request failed: {}", e);
                }
                return match child.wait().await {
                    Ok(status) => status.code(),
                    Err(e) => {
                        warn!("Wait after kill failed: {}", e);
                        None
                    }
                };
            }
            Some(false) => {
                if kill_rx.has_changed().is_err() {
                    // Sender gone; no kill can ever arrive. Plain wait.
                    return wait_with_retry(&mut child).await;
                }
            }
            None => {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(WAIT_RETRY_MAX);
            }
        }
    }
}

async fn wait_with_retry(child: &mut Child) -> Option<i32> {
    let mut backoff = WAIT_RETRY_INITIAL;
    loop {
        match child.wait().await {
            Ok(status) => return status.code(),
            Err(e) => {
                warn!("Process wait error, retrying in {:?}: {}", backoff, e);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(WAIT_RETRY_MAX);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::server::{ServerAnnouncement, ServerAddress};
    use std::path::PathBuf;

    fn test_server() -> Server {
        Server::from(ServerAnnouncement {
            address: ServerAddress::new("play.example.net", 7777),
            display_name: "Example".into(),
            region: "NA".into(),
            hidden: None,
            allow_advanced: true,
            allow_heavy_weapons: true,
            is_default: false,
        })
    }

    #[cfg(unix)]
    fn script_client(dir: &Path, name: &str, body: &str) -> GameClient {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        GameClient::new(path)
    }

    async fn wait_until_empty(supervisor: &ProcessSupervisor, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if supervisor.running_instances().await.is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn missing_executable_fails_launch() {
        let supervisor = ProcessSupervisor::new(true);
        let client = GameClient::new(PathBuf::from("/nonexistent/client.exe"));

        let err = supervisor.launch(&client, None, &[]).await.unwrap_err();
        assert!(matches!(err, LauncherError::LaunchFailed(_)));
        assert!(supervisor.running_instances().await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn natural_exit_removes_instance_from_active_set() {
        let tmp = tempfile::tempdir().unwrap();
        let supervisor = ProcessSupervisor::new(true);
        let client = script_client(tmp.path(), "quick.sh", "exit 0");

        supervisor.launch(&client, None, &[]).await.unwrap();
        assert!(wait_until_empty(&supervisor, Duration::from_secs(5)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn single_instance_policy_rejects_second_launch() {
        let tmp = tempfile::tempdir().unwrap();
        let supervisor = ProcessSupervisor::new(true);
        let client = script_client(tmp.path(), "long.sh", "sleep 30");

        supervisor.launch(&client, None, &[]).await.unwrap();
        let err = supervisor.launch(&client, None, &[]).await.unwrap_err();
        assert!(matches!(err, LauncherError::AlreadyRunning(_)));

        supervisor.force_close_all(Duration::from_secs(5)).await;
        assert!(supervisor.running_instances().await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn connected_query_sees_server_target_while_running() {
        let tmp = tempfile::tempdir().unwrap();
        let supervisor = ProcessSupervisor::new(true);
        let client = script_client(tmp.path(), "long.sh", "sleep 30");
        let server = test_server();

        supervisor
            .launch(&client, Some(&server), &[])
            .await
            .unwrap();

        assert!(
            supervisor
                .is_connected(&client.executable, &server.address)
                .await
        );
        assert!(
            !supervisor
                .is_connected(&client.executable, &ServerAddress::new("other.example.net", 7777))
                .await
        );

        supervisor.force_close_all(Duration::from_secs(5)).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn force_close_racing_launch_leaves_no_tracked_instance() {
        let tmp = tempfile::tempdir().unwrap();
        let supervisor = Arc::new(ProcessSupervisor::new(false));
        let client = script_client(tmp.path(), "long.sh", "sleep 30");

        // Race the close against a launch still in flight; neither side
        // may panic and the instance must end up absent.
        let launcher = {
            let supervisor = Arc::clone(&supervisor);
            let client = client.clone();
            tokio::spawn(async move { supervisor.launch(&client, None, &[]).await })
        };
        supervisor.force_close_all(Duration::from_millis(500)).await;
        let _ = launcher.await.unwrap();

        // The launch may have landed after the close; close again to
        // cover that interleaving.
        supervisor.force_close_all(Duration::from_secs(5)).await;
        assert!(wait_until_empty(&supervisor, Duration::from_secs(5)).await);
    }
}
