use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port clients connect to when an announcement does not say otherwise.
pub const DEFAULT_GAME_PORT: u16 = 7777;

/// Server identity: network address + port. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Last-known reachability of a server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
    TimedOut,
}

/// Live probe results. Never persisted and never touched by
/// metadata-only updates, so background probing state survives
/// re-announcements and policy edits.
#[derive(Debug, Clone, Default)]
pub struct ProbeState {
    pub status: Reachability,
    pub latency: Option<Duration>,
    pub last_probe: Option<DateTime<Utc>>,
}

/// A remote multiplayer endpoint the client can be launched against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub address: ServerAddress,
    pub display_name: String,
    pub region: String,
    /// Hidden from the default listing. Default-list entries are never
    /// deleted, only hidden.
    pub hidden: bool,
    /// Whether the server allows advanced-ruleset items.
    pub allow_advanced: bool,
    /// Whether the server allows the heavy weapon class.
    pub allow_heavy_weapons: bool,
    /// Entry comes from the built-in default list.
    pub is_default: bool,

    #[serde(skip)]
    pub probe: ProbeState,
}

/// Insert-or-merge payload for the directory.
///
/// `hidden` is optional on purpose: `Some(_)` explicitly requests a
/// visibility change, `None` leaves the user's flag alone, so routine
/// default-list re-announcements cannot unhide a server the user hid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAnnouncement {
    pub address: ServerAddress,
    pub display_name: String,
    pub region: String,
    #[serde(default)]
    pub hidden: Option<bool>,
    pub allow_advanced: bool,
    pub allow_heavy_weapons: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl From<ServerAnnouncement> for Server {
    fn from(a: ServerAnnouncement) -> Self {
        Self {
            address: a.address,
            display_name: a.display_name,
            region: a.region,
            hidden: a.hidden.unwrap_or(false),
            allow_advanced: a.allow_advanced,
            allow_heavy_weapons: a.allow_heavy_weapons,
            is_default: a.is_default,
            probe: ProbeState::default(),
        }
    }
}
