// ─── Vanguard Core ───
// Runtime backbone of the launcher.
//
// Architecture:
//   core/
//     client/   — installation model + registry (scan, validate)
//     modules/  — attached-module model + install/uninstall manager
//     server/   — server directory + concurrent liveness probing
//     launch/   — loadout validator, command builder, process supervisor
//     channel/  — single-instance claim + argv forwarding
//     profile/  — deep-link codec + profile store seam
//     state/    — process-wide owned state, settings, persistence

pub mod channel;
pub mod client;
pub mod error;
pub mod http;
pub mod launch;
pub mod modules;
pub mod profile;
pub mod server;
pub mod state;
