// ─── Server Probe ───
// One TCP connect round-trip against a server's game port, bounded by an
// independent timeout so a slow server can never starve the rest of a
// probe round.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use super::model::{Reachability, ServerAddress};

/// Result of a single probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub status: Reachability,
    pub latency: Option<Duration>,
}

/// Probe one server: resolve + connect inside `timeout`.
///
/// A completed connect records the round-trip as latency; a refusal or
/// resolution failure is `Unreachable`; exceeding the timeout is
/// `TimedOut`. Probing never fails the caller.
pub async fn probe_server(address: &ServerAddress, timeout: Duration) -> ProbeOutcome {
    let target = (address.host.as_str(), address.port);
    let started = Instant::now();

    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => {
            let latency = started.elapsed();
            debug!("Probe {} reachable in {:?}", address, latency);
            ProbeOutcome {
                status: Reachability::Reachable,
                latency: Some(latency),
            }
        }
        Ok(Err(e)) => {
            debug!("Probe {} unreachable: {}", address, e);
            ProbeOutcome {
                status: Reachability::Unreachable,
                latency: None,
            }
        }
        Err(_) => {
            debug!("Probe {} timed out after {:?}", address, timeout);
            ProbeOutcome {
                status: Reachability::TimedOut,
                latency: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_port_is_reachable_with_latency() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = ServerAddress::new("127.0.0.1", port);

        let outcome = probe_server(&address, Duration::from_secs(2)).await;
        assert_eq!(outcome.status, Reachability::Reachable);
        assert!(outcome.latency.is_some());
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        // Grab a free port and release it so the connect gets refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let address = ServerAddress::new("127.0.0.1", port);
        let outcome = probe_server(&address, Duration::from_secs(2)).await;
        assert_eq!(outcome.status, Reachability::Unreachable);
        assert_eq!(outcome.latency, None);
    }

    #[tokio::test]
    async fn zero_timeout_maps_to_timed_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = ServerAddress::new("127.0.0.1", port);

        let outcome = probe_server(&address, Duration::ZERO).await;
        assert_eq!(outcome.status, Reachability::TimedOut);
    }
}
