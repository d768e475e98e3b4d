// ─── Launch Task ───
// Builds the client process invocation: target server, per-installation
// config directory, caller-supplied extras.

use std::process::{Command, Stdio};

use crate::core::client::GameClient;
use crate::core::server::Server;

/// Construct the child-process command for launching `client`,
/// optionally pointed at `server`.
///
/// Argument shape: `[host:port] --config-dir <dir> [extra...]`. Empty
/// extra arguments are dropped rather than passed as empty strings.
pub fn build_launch_command(
    client: &GameClient,
    server: Option<&Server>,
    extra_args: &[String],
) -> Command {
    let mut cmd = Command::new(&client.executable);

    if let Some(server) = server {
        cmd.arg(server.address.to_string());
    }

    cmd.arg("--config-dir").arg(&client.config_dir);

    for arg in extra_args {
        if !arg.trim().is_empty() {
            cmd.arg(arg);
        }
    }

    if let Some(parent) = client.executable.parent() {
        cmd.current_dir(parent);
    }

    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd
}
