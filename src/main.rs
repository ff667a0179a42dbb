//! wakeword-bridge: wake word driven microphone controller
//!
//! Runs next to a voice assistant client and keeps three independent signals
//! in one listening cycle:
//! - Wake word mode (user toggle + keyword engine readiness)
//! - Conversational agent state
//! - Microphone mute state
//!
//! The client hosts the microphone and the keyword engine and talks to the
//! daemon over a Unix socket: it reports agent, mic and engine state, and
//! receives mute and engine commands back.

mod config;
mod events;
mod ipc;
mod lifecycle;
mod mic;
mod state;
mod wake;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::BridgeEvent;
use crate::ipc::{BridgeLink, Notification, Server};
use crate::lifecycle::ShutdownSignal;
use crate::mic::RemoteMicrophone;
use crate::state::WakeWordMicBridge;
use crate::wake::{AudioCapture, RemoteWakeEngine, WakeWordEngineAdapter, WakeWordModeController};

/// How long the bridge gets to release the engine on exit
const BRIDGE_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "wakeword-bridge starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, delay_ms = config.auto_mute_delay.as_millis() as u64, "configuration loaded");

    // Register shutdown signal handlers
    let mut shutdown = ShutdownSignal::install().context("failed to register signal handlers")?;

    // Daemon -> subscribed clients (events, mic and engine commands)
    let (notify_tx, _) = broadcast::channel::<Notification>(64);
    // Bridge -> main loop
    let (event_tx, mut event_rx) = broadcast::channel::<BridgeEvent>(64);

    // Wake word mode only exists when a keyword model is configured
    let (server, bridge_task) = match &config.wake_word {
        Some(wake_config) => {
            let (input_tx, input_rx) = mpsc::channel(64);
            let mic = Arc::new(RemoteMicrophone::new(notify_tx.clone()));
            let engine = RemoteWakeEngine::new(notify_tx.clone(), wake_config.clone());
            let adapter = WakeWordEngineAdapter::new(Box::new(engine), AudioCapture::new());
            let mode = WakeWordModeController::new(adapter, wake_config.default_enabled);
            let bridge = WakeWordMicBridge::new(
                mode,
                mic.clone(),
                config.auto_mute_delay,
                event_tx.clone(),
            );

            let link = BridgeLink {
                inputs: input_tx,
                mic,
            };
            let server = Server::with_bridge(&config.socket_path, notify_tx.clone(), link)?;
            server.set_wake_word(bridge.status()).await;

            (server, Some(tokio::spawn(bridge.run(input_rx))))
        }
        None => {
            warn!("WAKEWORD_KEYWORD_PATH not set, wake word mode unavailable");
            (Server::new(&config.socket_path, notify_tx.clone())?, None)
        }
    };

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Mirror bridge events to the status snapshot and to clients
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "bridge event");
                        if let BridgeEvent::StatusChanged(status) = &event {
                            server.set_wake_word(status.clone()).await;
                        }
                        let _ = notify_tx.send(Notification::Event { event });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "bridge event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("bridge event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;
    // Drops the last input sender once client handlers are gone
    drop(server);

    if let Some(task) = bridge_task {
        match tokio::time::timeout(BRIDGE_STOP_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(?e, "bridge task failed"),
            Err(_) => warn!("bridge did not stop in time"),
        }
    }

    info!("wakeword-bridge stopped");

    Ok(())
}
