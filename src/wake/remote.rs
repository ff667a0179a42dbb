//! Keyword engine hosted by the connected client
//!
//! The acoustic engine runs next to the microphone in the client. The daemon
//! drives it with `engine_command` notifications; readiness, detections and
//! errors come back as IPC requests.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::engine::{EngineError, WakeWordEngine};
use crate::config::WakeWordConfig;
use crate::ipc::Notification;

pub struct RemoteWakeEngine {
    notify_tx: broadcast::Sender<Notification>,
    config: WakeWordConfig,
}

impl RemoteWakeEngine {
    pub fn new(notify_tx: broadcast::Sender<Notification>, config: WakeWordConfig) -> Self {
        Self { notify_tx, config }
    }

    fn command(&self, listen: bool) -> Notification {
        Notification::EngineCommand {
            listen,
            keyword_path: self.config.keyword_path.to_string_lossy().into_owned(),
            sensitivity: self.config.sensitivity,
        }
    }
}

#[async_trait]
impl WakeWordEngine for RemoteWakeEngine {
    async fn start(&mut self) -> Result<(), EngineError> {
        self.notify_tx
            .send(self.command(true))
            .map_err(|_| EngineError::Init("no client attached to host the keyword engine".into()))?;
        debug!(keyword_path = ?self.config.keyword_path, "engine start requested");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.notify_tx
            .send(self.command(false))
            .map_err(|_| EngineError::Stop("no client attached".into()))?;
        debug!("engine stop requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio_test::assert_ok;

    use super::*;

    fn config() -> WakeWordConfig {
        WakeWordConfig {
            keyword_path: PathBuf::from("/models/hey_cal.ppn"),
            sensitivity: 0.5,
            default_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_start_without_client_fails() {
        let (tx, _) = broadcast::channel(4);
        let mut engine = RemoteWakeEngine::new(tx, config());

        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, EngineError::Init(_)));
    }

    #[tokio::test]
    async fn test_start_and_stop_push_commands() {
        let (tx, mut rx) = broadcast::channel(4);
        let mut engine = RemoteWakeEngine::new(tx, config());

        assert_ok!(engine.start().await);
        assert_ok!(engine.stop().await);

        match rx.recv().await.unwrap() {
            Notification::EngineCommand {
                listen,
                keyword_path,
                sensitivity,
            } => {
                assert!(listen);
                assert_eq!(keyword_path, "/models/hey_cal.ppn");
                assert_eq!(sensitivity, 0.5);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            Notification::EngineCommand { listen: false, .. }
        ));
    }
}
