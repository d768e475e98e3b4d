pub mod core;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::channel::{self, InstanceRole};
use crate::core::error::LauncherResult;
use crate::core::profile::{process_invocation, FileProfileStore, ProfileStore};
use crate::core::state::app_state::default_data_dir;
use crate::core::state::AppState;

/// Grace period granted to running clients at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How often the background refresh asks for a probe round. Rounds are
/// additionally interval-gated inside the directory itself.
const PROBE_TICK: Duration = Duration::from_secs(30);

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vanguard_lib=debug")),
        )
        .init();
}

/// Launcher entry point for one OS invocation.
///
/// Claims the single-instance channel first: if another primary already
/// holds it, `args` are forwarded there and this call returns
/// immediately so the process can exit with success.
pub async fn run(args: Vec<String>) -> LauncherResult<()> {
    info!("Vanguard launcher starting...");

    let mut primary = match channel::claim_or_forward(channel::default_channel_addr(), &args).await?
    {
        InstanceRole::Primary(primary) => primary,
        InstanceRole::Secondary => {
            info!("Handed arguments to the running instance, exiting");
            return Ok(());
        }
    };

    let state = Arc::new(AppState::new(default_data_dir())?);
    state.startup().await?;

    let profile_store: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::new(state.profiles_dir()));

    // Our own argv may already carry a deep link (first launch via URI).
    process_invocation(&args, profile_store.as_ref()).await;

    // Background probing runs independent of launches; aborted at
    // shutdown rather than awaited.
    let prober = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(PROBE_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                state.directory.probe_all(false).await;
            }
        })
    };

    // Drain forwarded invocations in arrival order; imports apply
    // serially because this loop is the only consumer.
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            message = primary.recv() => match message {
                Some(forwarded) => {
                    process_invocation(&forwarded, profile_store.as_ref()).await;
                }
                None => {
                    warn!("Instance channel listener stopped");
                    break;
                }
            },
        }
    }

    prober.abort();
    state.shutdown(SHUTDOWN_GRACE).await;
    info!("Vanguard launcher stopped");
    Ok(())
}
