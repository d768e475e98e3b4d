// ─── Single-Instance Channel ───
// Arbitrates which launcher process is "primary" and relays secondary
// invocations' arguments to it. The claim is a loopback TCP bind on a
// well-known port: whoever holds the listener is primary; everyone
// else forwards their argv as one JSON message and exits.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// Well-known loopback port the claim lives on.
pub const DEFAULT_CHANNEL_PORT: u16 = 47615;

const QUEUE_DEPTH: usize = 32;

pub fn default_channel_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_CHANNEL_PORT))
}

/// Outcome of the startup claim.
pub enum InstanceRole {
    /// This process owns the launcher identity; drain the queue.
    Primary(PrimaryChannel),
    /// Arguments were handed to the running primary; exit with success.
    Secondary,
}

/// The primary side: an ordered queue of forwarded argv payloads.
pub struct PrimaryChannel {
    messages: mpsc::Receiver<Vec<String>>,
    local_addr: SocketAddr,
}

impl PrimaryChannel {
    /// Next forwarded invocation, in arrival order. `None` only if the
    /// listener task died.
    pub async fn recv(&mut self) -> Option<Vec<String>> {
        self.messages.recv().await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Claim the channel or hand our arguments to whoever holds it.
///
/// Bind succeeds → we are primary and the accept loop starts. Bind
/// fails → connect as a client and forward `args`. If the connect also
/// fails (primary crashed mid-claim, stale socket) one re-claim attempt
/// is made before giving up with `ChannelUnavailable`.
pub async fn claim_or_forward(addr: SocketAddr, args: &[String]) -> LauncherResult<InstanceRole> {
    match try_claim(addr).await {
        Ok(primary) => return Ok(InstanceRole::Primary(primary)),
        Err(e) => debug!("Channel claim failed ({}), trying to forward", e),
    }

    match forward(addr, args).await {
        Ok(()) => {
            info!("Forwarded {} argument(s) to the running primary", args.len());
            return Ok(InstanceRole::Secondary);
        }
        Err(e) => warn!("Forward to primary failed ({}), reclaiming", e),
    }

    // Stale claim: the holder is gone but the bind may now succeed.
    match try_claim(addr).await {
        Ok(primary) => Ok(InstanceRole::Primary(primary)),
        Err(e) => Err(LauncherError::ChannelUnavailable(e.to_string())),
    }
}

async fn try_claim(addr: SocketAddr) -> std::io::Result<PrimaryChannel> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Claimed instance channel at {}", local_addr);

    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(accept_loop(listener, tx));

    Ok(PrimaryChannel {
        messages: rx,
        local_addr,
    })
}

/// Single-threaded acceptance loop. Each connection carries exactly one
/// argv payload and is read to completion before the next accept, so
/// messages enter the queue in arrival order.
async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<Vec<String>>) {
    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Channel accept error: {}", e);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                continue;
            }
        };

        let mut payload = Vec::new();
        if let Err(e) = stream.read_to_end(&mut payload).await {
            warn!("Channel read error from {}: {}", peer, e);
            continue;
        }

        match serde_json::from_slice::<Vec<String>>(&payload) {
            Ok(args) => {
                debug!("Received {} forwarded argument(s) from {}", args.len(), peer);
                if tx.send(args).await.is_err() {
                    // Consumer gone; the primary is shutting down.
                    return;
                }
            }
            Err(e) => warn!("Discarding malformed channel message from {}: {}", peer, e),
        }
    }
}

async fn forward(addr: SocketAddr, args: &[String]) -> LauncherResult<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| LauncherError::ChannelUnavailable(e.to_string()))?;

    let payload = serde_json::to_vec(&args)?;
    stream
        .write_all(&payload)
        .await
        .map_err(|e| LauncherError::ChannelUnavailable(e.to_string()))?;
    stream
        .shutdown()
        .await
        .map_err(|e| LauncherError::ChannelUnavailable(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn second_invocation_becomes_secondary_and_forwards_args() {
        let role = claim_or_forward(ephemeral_addr(), &[]).await.unwrap();
        let mut primary = match role {
            InstanceRole::Primary(p) => p,
            InstanceRole::Secondary => panic!("first claim must be primary"),
        };

        let args = vec!["vanguard://import-profile/abc".to_string()];
        let second = claim_or_forward(primary.local_addr(), &args).await.unwrap();
        assert!(matches!(second, InstanceRole::Secondary));

        let received = primary.recv().await.unwrap();
        assert_eq!(received, args);
    }

    #[tokio::test]
    async fn forwarded_messages_arrive_in_order() {
        let role = claim_or_forward(ephemeral_addr(), &[]).await.unwrap();
        let mut primary = match role {
            InstanceRole::Primary(p) => p,
            InstanceRole::Secondary => panic!("first claim must be primary"),
        };
        let addr = primary.local_addr();

        for i in 0..5 {
            forward(addr, &[format!("arg-{i}")]).await.unwrap();
        }

        for i in 0..5 {
            assert_eq!(primary.recv().await.unwrap(), vec![format!("arg-{i}")]);
        }
    }

    #[tokio::test]
    async fn malformed_messages_are_dropped_not_fatal() {
        let role = claim_or_forward(ephemeral_addr(), &[]).await.unwrap();
        let mut primary = match role {
            InstanceRole::Primary(p) => p,
            InstanceRole::Secondary => panic!("first claim must be primary"),
        };
        let addr = primary.local_addr();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"not json").await.unwrap();
        stream.shutdown().await.unwrap();
        drop(stream);

        // The queue still works for well-formed traffic afterwards.
        forward(addr, &["ok".to_string()]).await.unwrap();
        assert_eq!(primary.recv().await.unwrap(), vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn forwarding_to_a_dead_port_reports_channel_unavailable() {
        // Grab and release a port so nothing is listening on it.
        let listener = TcpListener::bind(ephemeral_addr()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = forward(addr, &["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, LauncherError::ChannelUnavailable(_)));
    }
}
