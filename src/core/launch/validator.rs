// ─── Connection Validator ───
// Pure decision function: is this loadout legal on that server?
// Never mutates either side.

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::server::Server;

/// The slice of externally-owned loadout data the validator needs:
/// which gated capabilities the loadout relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loadout {
    pub name: String,
    /// Uses advanced-ruleset items.
    pub uses_advanced: bool,
    /// Uses the heavy weapon class.
    pub uses_heavy_weapons: bool,
}

/// Check `loadout` against the capability flags `server` declares.
///
/// Failure carries a human-readable reason naming the disallowed
/// capability so the UI can surface something actionable.
pub fn validate_loadout(loadout: &Loadout, server: &Server) -> LauncherResult<()> {
    if loadout.uses_advanced && !server.allow_advanced {
        return Err(LauncherError::ValidationRejected(format!(
            "loadout '{}' uses advanced-ruleset items, which {} does not allow",
            loadout.name, server.address
        )));
    }

    if loadout.uses_heavy_weapons && !server.allow_heavy_weapons {
        return Err(LauncherError::ValidationRejected(format!(
            "loadout '{}' uses the heavy weapon class, which {} does not allow",
            loadout.name, server.address
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::server::{ServerAddress, ServerAnnouncement};

    fn server(allow_advanced: bool, allow_heavy_weapons: bool) -> Server {
        Server::from(ServerAnnouncement {
            address: ServerAddress::new("test.example.net", 7777),
            display_name: "Test".into(),
            region: "NA".into(),
            hidden: None,
            allow_advanced,
            allow_heavy_weapons,
            is_default: false,
        })
    }

    #[test]
    fn advanced_loadout_rejected_by_restricted_server() {
        let loadout = Loadout {
            name: "raider".into(),
            uses_advanced: true,
            uses_heavy_weapons: false,
        };

        let err = validate_loadout(&loadout, &server(false, true)).unwrap_err();
        match err {
            LauncherError::ValidationRejected(reason) => {
                assert!(reason.contains("advanced"));
                assert!(reason.contains("raider"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn heavy_weapons_rejected_when_disallowed() {
        let loadout = Loadout {
            name: "gunner".into(),
            uses_advanced: false,
            uses_heavy_weapons: true,
        };

        let err = validate_loadout(&loadout, &server(true, false)).unwrap_err();
        assert!(matches!(err, LauncherError::ValidationRejected(r) if r.contains("heavy")));
    }

    #[test]
    fn permissive_server_accepts_everything() {
        let loadout = Loadout {
            name: "anything".into(),
            uses_advanced: true,
            uses_heavy_weapons: true,
        };

        assert!(validate_loadout(&loadout, &server(true, true)).is_ok());
    }
}
