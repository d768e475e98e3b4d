// ─── Server Directory ───
// Authoritative list of known servers and their freshness-bounded
// liveness data. Policy metadata merges never touch probe state, and
// probing never removes an entry.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};

use super::model::{Server, ServerAddress, ServerAnnouncement, DEFAULT_GAME_PORT};
use super::probe::probe_server;

const REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(4);

/// What `add_or_update` did with an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Merged,
}

struct DirectoryInner {
    /// Insertion-ordered; `list()` preserves this order.
    servers: Vec<Server>,
    /// `None` means "never probed", which naturally admits the first
    /// round regardless of the refresh interval.
    last_round: Option<Instant>,
    rounds: u64,
}

/// Owns the server list. All writes serialize through the inner lock;
/// reads hand out clones.
pub struct ServerDirectory {
    inner: RwLock<DirectoryInner>,
    store_path: PathBuf,
    refresh_interval: Duration,
    probe_timeout: Duration,
}

impl ServerDirectory {
    pub fn new(store_path: PathBuf) -> Self {
        Self {
            inner: RwLock::new(DirectoryInner {
                servers: Vec::new(),
                last_round: None,
                rounds: 0,
            }),
            store_path,
            refresh_interval: REFRESH_INTERVAL,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the refresh interval and per-probe timeout.
    pub fn with_intervals(mut self, refresh: Duration, probe_timeout: Duration) -> Self {
        self.refresh_interval = refresh;
        self.probe_timeout = probe_timeout;
        self
    }

    // ── Persistence ─────────────────────────────────────

    /// Load the persisted server list. Corrupt documents are logged and
    /// ignored so a bad file cannot keep the launcher from starting.
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

        match serde_json::from_str::<Vec<Server>>(&raw) {
            Ok(loaded) => {
                let mut inner = self.inner.write().await;
                inner.servers = loaded;
                info!("Loaded {} servers", inner.servers.len());
            }
            Err(e) => warn!("Corrupt server list at {:?}: {}", self.store_path, e),
        }

        Ok(())
    }

    pub async fn save(&self) -> LauncherResult<()> {
        let inner = self.inner.read().await;
        let json = serde_json::to_string_pretty(&inner.servers)?;

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

    // ── Mutation ────────────────────────────────────────

    /// Insert a new server, or merge policy fields into the existing
    /// entry with the same identity. Merging updates region, capability
    /// flags, the default marker and (only when explicitly requested)
    /// the hidden flag; live probe state is left untouched.
    pub async fn add_or_update(&self, announcement: ServerAnnouncement) -> Upsert {
        let mut inner = self.inner.write().await;

        match inner
            .servers
            .iter_mut()
            .find(|s| s.address == announcement.address)
        {
            Some(existing) => {
                existing.region = announcement.region;
                existing.allow_advanced = announcement.allow_advanced;
                existing.allow_heavy_weapons = announcement.allow_heavy_weapons;
                existing.is_default |= announcement.is_default;
                if let Some(hidden) = announcement.hidden {
                    existing.hidden = hidden;
                }
                Upsert::Merged
            }
            None => {
                info!("Adding server {}", announcement.address);
                inner.servers.push(Server::from(announcement));
                Upsert::Inserted
            }
        }
    }

    pub async fn set_hidden(&self, address: &ServerAddress, hidden: bool) -> LauncherResult<()> {
        let mut inner = self.inner.write().await;
        let server = inner
            .servers
            .iter_mut()
            .find(|s| s.address == *address)
            .ok_or_else(|| LauncherError::Other(format!("unknown server {}", address)))?;
        server.hidden = hidden;
        Ok(())
    }

    /// Re-announce the built-in default list. Existing entries merge
    /// without touching the user's hidden flag.
    pub async fn sync_default_servers(&self) {
        for announcement in default_servers() {
            self.add_or_update(announcement).await;
        }
    }

    /// Refresh the default list from the hosted document. Failure is
    /// logged and leaves the built-ins in place.
    pub async fn fetch_remote_servers(&self, client: &reqwest::Client, url: &str) {
        let fetched: Result<Vec<ServerAnnouncement>, _> = async {
            client.get(url).send().await?.json().await
        }
        .await;

        match fetched {
            Ok(announcements) => {
                info!("Fetched {} server announcements", announcements.len());
                for announcement in announcements {
                    self.add_or_update(announcement).await;
                }
            }
            Err(e) => warn!("Server list fetch failed: {}", e),
        }
    }

    // ── Probing ─────────────────────────────────────────

    /// Run one probe round over every registered server.
    ///
    /// Rounds are gated by the minimum refresh interval unless `force`
    /// is set; the first round after startup always runs. All probes in
    /// a round run concurrently, each with its own timeout. Returns
    /// whether a round was actually performed.
    pub async fn probe_all(&self, force: bool) -> bool {
        let targets: Vec<ServerAddress> = {
            let mut inner = self.inner.write().await;
            let due = force
                || inner
                    .last_round
                    .map_or(true, |t| t.elapsed() >= self.refresh_interval);
            if !due {
                return false;
            }

            inner.last_round = Some(Instant::now());
            inner.rounds += 1;
            inner.servers.iter().map(|s| s.address.clone()).collect()
        };

        let timeout = self.probe_timeout;
        let outcomes = join_all(targets.iter().map(|address| async move {
            (address.clone(), probe_server(address, timeout).await)
        }))
        .await;

        let mut inner = self.inner.write().await;
        for (address, outcome) in outcomes {
            // A server may have been re-announced mid-round; it is never
            // removed, so the lookup only misses if the list was wiped.
            if let Some(server) = inner.servers.iter_mut().find(|s| s.address == address) {
                server.probe.status = outcome.status;
                if let Some(latency) = outcome.latency {
                    server.probe.latency = Some(latency);
                }
                server.probe.last_probe = Some(Utc::now());
            }
        }

        true
    }

    /// How many probe rounds have completed since startup.
    pub async fn probe_rounds(&self) -> u64 {
        self.inner.read().await.rounds
    }

    // ── Queries ─────────────────────────────────────────

    pub async fn get(&self, address: &ServerAddress) -> Option<Server> {
        let inner = self.inner.read().await;
        inner.servers.iter().find(|s| s.address == *address).cloned()
    }

    /// All servers in insertion order.
    pub async fn list(&self) -> Vec<Server> {
        self.inner.read().await.servers.clone()
    }

    /// Servers not hidden from the default listing.
    pub async fn list_visible(&self) -> Vec<Server> {
        let inner = self.inner.read().await;
        inner.servers.iter().filter(|s| !s.hidden).cloned().collect()
    }

    /// Servers sorted by last measured latency, unmeasured entries last.
    pub async fn list_by_latency(&self) -> Vec<Server> {
        let mut servers = self.list().await;
        servers.sort_by_key(|s| s.probe.latency.unwrap_or(Duration::MAX));
        servers
    }
}

/// Built-in default servers, re-announced on every startup.
pub fn default_servers() -> Vec<ServerAnnouncement> {
    vec![
        ServerAnnouncement {
            address: ServerAddress::new("na.play.vanguard.gg", DEFAULT_GAME_PORT),
            display_name: "Vanguard Official NA".into(),
            region: "NA".into(),
            hidden: None,
            allow_advanced: true,
            allow_heavy_weapons: true,
            is_default: true,
        },
        ServerAnnouncement {
            address: ServerAddress::new("eu.play.vanguard.gg", DEFAULT_GAME_PORT),
            display_name: "Vanguard Official EU".into(),
            region: "EU".into(),
            hidden: None,
            allow_advanced: true,
            allow_heavy_weapons: true,
            is_default: true,
        },
        ServerAnnouncement {
            address: ServerAddress::new("classic.play.vanguard.gg", DEFAULT_GAME_PORT),
            display_name: "Vanguard Classic (no advanced gear)".into(),
            region: "NA".into(),
            hidden: None,
            allow_advanced: false,
            allow_heavy_weapons: false,
            is_default: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::server::model::Reachability;

    fn announcement(host: &str, region: &str) -> ServerAnnouncement {
        ServerAnnouncement {
            address: ServerAddress::new(host, DEFAULT_GAME_PORT),
            display_name: host.to_string(),
            region: region.into(),
            hidden: None,
            allow_advanced: true,
            allow_heavy_weapons: true,
            is_default: false,
        }
    }

    fn test_directory(dir: &std::path::Path) -> ServerDirectory {
        ServerDirectory::new(dir.join("servers.json"))
            .with_intervals(Duration::from_secs(3600), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn re_announcement_merges_policy_but_preserves_probe_state() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = test_directory(tmp.path());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut first = announcement("127.0.0.1", "NA");
        first.address = ServerAddress::new("127.0.0.1", port);
        assert_eq!(directory.add_or_update(first.clone()).await, Upsert::Inserted);

        assert!(directory.probe_all(false).await);
        let probed = directory.get(&first.address).await.unwrap();
        assert_eq!(probed.probe.status, Reachability::Reachable);
        let latency = probed.probe.latency;
        assert!(latency.is_some());

        // Metadata-only update: new policy, probe state untouched.
        let mut second = first.clone();
        second.region = "EU".into();
        second.allow_advanced = false;
        assert_eq!(directory.add_or_update(second).await, Upsert::Merged);

        let merged = directory.get(&first.address).await.unwrap();
        assert_eq!(merged.region, "EU");
        assert!(!merged.allow_advanced);
        assert_eq!(merged.probe.status, Reachability::Reachable);
        assert_eq!(merged.probe.latency, latency);
    }

    #[tokio::test]
    async fn probe_rounds_are_interval_gated_unless_forced() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = test_directory(tmp.path());
        directory.add_or_update(announcement("127.0.0.1", "NA")).await;

        // First round always runs: last_round starts as the never-probed
        // sentinel.
        assert!(directory.probe_all(false).await);
        assert_eq!(directory.probe_rounds().await, 1);

        // Second unforced round inside the interval is skipped.
        assert!(!directory.probe_all(false).await);
        assert_eq!(directory.probe_rounds().await, 1);

        // Forced rounds always run.
        assert!(directory.probe_all(true).await);
        assert_eq!(directory.probe_rounds().await, 2);
    }

    #[tokio::test]
    async fn default_sync_never_clears_a_user_hidden_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = test_directory(tmp.path());

        directory.sync_default_servers().await;
        let address = default_servers()[0].address.clone();

        directory.set_hidden(&address, true).await.unwrap();
        directory.sync_default_servers().await;

        let server = directory.get(&address).await.unwrap();
        assert!(server.hidden);
        assert!(server.is_default);

        // Explicitly requested visibility changes do apply.
        let mut unhide = default_servers()[0].clone();
        unhide.hidden = Some(false);
        directory.add_or_update(unhide).await;
        assert!(!directory.get(&address).await.unwrap().hidden);
    }

    #[tokio::test]
    async fn list_preserves_insertion_order_and_latency_sort_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = test_directory(tmp.path());

        directory.add_or_update(announcement("b.example.net", "EU")).await;
        directory.add_or_update(announcement("a.example.net", "NA")).await;

        let listed = directory.list().await;
        assert_eq!(listed[0].address.host, "b.example.net");
        assert_eq!(listed[1].address.host, "a.example.net");

        // No latency measured yet: sort keeps both at the end in order.
        let sorted = directory.list_by_latency().await;
        assert_eq!(sorted[0].address.host, "b.example.net");
    }

    #[tokio::test]
    async fn probing_never_removes_servers() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = test_directory(tmp.path());

        // Refused port: probe outcome is Unreachable, entry stays.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut dead = announcement("127.0.0.1", "NA");
        dead.address = ServerAddress::new("127.0.0.1", port);
        directory.add_or_update(dead.clone()).await;

        directory.probe_all(true).await;

        let server = directory.get(&dead.address).await.unwrap();
        assert_eq!(server.probe.status, Reachability::Unreachable);
        assert_eq!(directory.list().await.len(), 1);
    }

    #[tokio::test]
    async fn server_list_round_trips_without_probe_state() {
        let tmp = tempfile::tempdir().unwrap();
        let store = tmp.path().join("servers.json");

        let directory = ServerDirectory::new(store.clone());
        directory.add_or_update(announcement("a.example.net", "NA")).await;
        directory.save().await.unwrap();

        let reloaded = ServerDirectory::new(store);
        reloaded.load().await.unwrap();

        let servers = reloaded.list().await;
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].probe.status, Reachability::Unknown);
    }
}
