//! Microphone owned by the connected client

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{MicError, MicrophoneControl};
use crate::ipc::Notification;

/// Microphone driven through `set_microphone` notifications.
///
/// The client reports the real state back with `mic_state` requests.
pub struct RemoteMicrophone {
    enabled: AtomicBool,
    notify_tx: broadcast::Sender<Notification>,
}

impl RemoteMicrophone {
    pub fn new(notify_tx: broadcast::Sender<Notification>) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            notify_tx,
        }
    }

    /// Record the state the client reported
    pub fn report(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            debug!(enabled, "microphone state reported");
        }
    }
}

#[async_trait]
impl MicrophoneControl for RemoteMicrophone {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn toggle(&self, enabled: bool) -> Result<(), MicError> {
        self.notify_tx
            .send(Notification::SetMicrophone { enabled })
            .map_err(|_| MicError::Toggle("no client attached".into()))?;
        // State changes only when the client reports back
        debug!(enabled, "microphone command sent");
        Ok(())
    }
}
