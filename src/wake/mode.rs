//! Wake word mode state machine
//!
//! Reconciles the user's enable toggle with engine readiness:
//! Disabled -> Initializing -> Listening, with Error reachable from any state.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::adapter::{AdapterSignal, WakeWordEngineAdapter};
use super::engine::EngineEvent;

/// Phase of wake word mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    /// User has wake word mode switched off
    #[default]
    Disabled,
    /// Enabled, waiting for the engine to become ready
    Initializing,
    /// Engine is spotting keywords
    Listening,
    /// Engine failed; waiting for the user to re-toggle
    Error,
}

impl std::fmt::Display for ModeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeState::Disabled => write!(f, "Disabled"),
            ModeState::Initializing => write!(f, "Initializing"),
            ModeState::Listening => write!(f, "Listening"),
            ModeState::Error => write!(f, "Error"),
        }
    }
}

/// Snapshot of the wake word session as seen by the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeWordStatus {
    pub enabled: bool,
    pub ready: bool,
    pub listening: bool,
    pub error: Option<String>,
    pub mode: ModeState,
}

impl WakeWordStatus {
    /// Enabled and the engine can hear the keyword
    pub fn is_armed(&self) -> bool {
        self.enabled && self.ready
    }
}

/// Owns the wake word toggle and drives the engine adapter to match it
pub struct WakeWordModeController {
    adapter: WakeWordEngineAdapter,
    enabled: bool,
    mode: ModeState,
}

impl WakeWordModeController {
    pub fn new(adapter: WakeWordEngineAdapter, default_enabled: bool) -> Self {
        let mode = if default_enabled {
            ModeState::Initializing
        } else {
            ModeState::Disabled
        };
        Self {
            adapter,
            enabled: default_enabled,
            mode,
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> ModeState {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> WakeWordStatus {
        WakeWordStatus {
            enabled: self.enabled,
            ready: self.adapter.ready(),
            listening: self.adapter.is_listening(),
            error: self.adapter.last_error().map(str::to_owned),
            mode: self.mode,
        }
    }

    /// Apply the user's toggle. Any call acknowledges a pending error.
    pub async fn set_enabled(&mut self, enabled: bool) {
        if self.mode == ModeState::Error {
            info!("wake word error acknowledged");
            self.adapter.clear_error();
        }

        self.enabled = enabled;
        if enabled {
            self.try_start().await;
        } else {
            self.release_engine().await;
            self.transition_to(ModeState::Disabled);
        }
    }

    /// Manually start listening; only honored while enabled
    pub async fn start_listening(&mut self) {
        if !self.enabled {
            debug!("start_listening ignored, wake word mode disabled");
            return;
        }
        if self.mode == ModeState::Error {
            debug!("start_listening ignored, error not acknowledged");
            return;
        }
        self.try_start().await;
    }

    /// Manually stop listening. Enabled mode waits for the next readiness report.
    pub async fn stop_listening(&mut self) {
        self.release_engine().await;
        if self.mode == ModeState::Listening {
            self.transition_to(ModeState::Initializing);
        }
    }

    /// Fold an engine event into the mode.
    ///
    /// Returns true when a detection should be forwarded to subscribers.
    pub async fn handle_engine_event(&mut self, event: EngineEvent) -> bool {
        match self.adapter.handle_event(event) {
            AdapterSignal::ReadyChanged(ready) => {
                self.handle_ready(ready).await;
                false
            }
            AdapterSignal::Detected => {
                if self.enabled {
                    info!("wake word detected");
                    true
                } else {
                    debug!("dropping wake word detection, mode disabled");
                    false
                }
            }
            AdapterSignal::Failed(_) => {
                self.release_engine().await;
                self.transition_to(ModeState::Error);
                false
            }
        }
    }

    async fn handle_ready(&mut self, ready: bool) {
        if !self.enabled || self.mode == ModeState::Error {
            return;
        }

        if ready {
            if !self.adapter.is_listening() {
                self.try_start().await;
            }
        } else {
            // Keep listening => ready
            self.release_engine().await;
            self.transition_to(ModeState::Initializing);
        }
    }

    async fn try_start(&mut self) {
        if !self.adapter.ready() {
            self.transition_to(ModeState::Initializing);
            return;
        }

        match self.adapter.start().await {
            Ok(()) => self.transition_to(ModeState::Listening),
            Err(e) => {
                error!(error = %e, "wake word mode could not start listening");
                self.transition_to(ModeState::Error);
            }
        }
    }

    /// Best-effort stop; failures never block the transition
    async fn release_engine(&mut self) {
        if let Err(e) = self.adapter.stop().await {
            warn!(error = %e, "ignoring wake word stop failure");
        }
    }

    fn transition_to(&mut self, new_mode: ModeState) {
        if new_mode != self.mode {
            info!(
                from = %self.mode,
                to = %new_mode,
                enabled = self.enabled,
                "wake word mode transition"
            );
        }
        self.mode = new_mode;
    }

    /// Release the engine on teardown
    pub async fn shutdown(&mut self) {
        self.release_engine().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::wake::adapter::AudioCapture;
    use crate::wake::engine::fake::{EngineLog, FakeEngine};

    fn controller(default_enabled: bool) -> (WakeWordModeController, Arc<EngineLog>) {
        let (engine, log) = FakeEngine::new();
        let adapter = WakeWordEngineAdapter::new(Box::new(engine), AudioCapture::new());
        (WakeWordModeController::new(adapter, default_enabled), log)
    }

    #[test]
    fn test_initial_state() {
        let (ctrl, _) = controller(false);
        assert_eq!(ctrl.mode(), ModeState::Disabled);
        assert_eq!(ctrl.status(), WakeWordStatus::default());

        let (ctrl, _) = controller(true);
        assert_eq!(ctrl.mode(), ModeState::Initializing);
    }

    #[tokio::test]
    async fn test_enable_before_ready_defers_start() {
        let (mut ctrl, log) = controller(false);

        ctrl.set_enabled(true).await;
        assert_eq!(ctrl.mode(), ModeState::Initializing);
        assert_eq!(log.starts(), 0);

        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;
        assert_eq!(ctrl.mode(), ModeState::Listening);
        assert_eq!(log.starts(), 1);
        assert!(ctrl.status().listening);
    }

    #[tokio::test]
    async fn test_enable_when_ready_starts_immediately() {
        let (mut ctrl, log) = controller(false);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;
        assert_eq!(log.starts(), 0);

        ctrl.set_enabled(true).await;
        assert_eq!(ctrl.mode(), ModeState::Listening);
        assert_eq!(log.starts(), 1);
    }

    #[tokio::test]
    async fn test_disable_stops_once() {
        let (mut ctrl, log) = controller(true);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;

        ctrl.set_enabled(false).await;
        ctrl.set_enabled(false).await;
        ctrl.stop_listening().await;

        assert_eq!(ctrl.mode(), ModeState::Disabled);
        assert_eq!(log.stops(), 1);
        assert!(!ctrl.status().listening);
    }

    #[tokio::test]
    async fn test_repeated_start_is_noop() {
        let (mut ctrl, log) = controller(true);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;

        ctrl.start_listening().await;
        ctrl.start_listening().await;
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;

        assert_eq!(log.starts(), 1);
        assert_eq!(ctrl.mode(), ModeState::Listening);
    }

    #[tokio::test]
    async fn test_stop_failure_does_not_block_disable() {
        let (mut ctrl, log) = controller(true);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;
        log.fail_stop.store(true, Ordering::SeqCst);

        ctrl.set_enabled(false).await;
        assert_eq!(ctrl.mode(), ModeState::Disabled);
        assert!(!ctrl.status().listening);
    }

    #[tokio::test]
    async fn test_start_failure_keeps_enabled_and_requires_retoggle() {
        let (mut ctrl, log) = controller(false);
        log.fail_start.store(true, Ordering::SeqCst);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;

        ctrl.set_enabled(true).await;
        let status = ctrl.status();
        assert_eq!(status.mode, ModeState::Error);
        assert!(status.enabled);
        assert!(status.error.unwrap().contains("invalid access key"));

        // Readiness alone does not retry, and the message stays visible
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;
        ctrl.start_listening().await;
        assert_eq!(log.starts(), 1);
        let status = ctrl.status();
        assert_eq!(status.mode, ModeState::Error);
        assert!(status.error.unwrap().contains("invalid access key"));

        log.fail_start.store(false, Ordering::SeqCst);
        ctrl.set_enabled(true).await;
        assert_eq!(ctrl.mode(), ModeState::Listening);
        assert_eq!(ctrl.status().error, None);
        assert_eq!(log.starts(), 2);
    }

    #[tokio::test]
    async fn test_engine_error_releases_engine() {
        let (mut ctrl, log) = controller(true);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;

        ctrl.handle_engine_event(EngineEvent::Error("mic unplugged".into()))
            .await;

        let status = ctrl.status();
        assert_eq!(status.mode, ModeState::Error);
        assert!(status.enabled);
        assert!(!status.listening);
        assert_eq!(status.error.as_deref(), Some("mic unplugged"));
        assert_eq!(log.stops(), 1);
    }

    #[tokio::test]
    async fn test_losing_readiness_stops_listening() {
        let (mut ctrl, log) = controller(true);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;

        ctrl.handle_engine_event(EngineEvent::Ready(false)).await;
        assert_eq!(ctrl.mode(), ModeState::Initializing);
        assert!(!ctrl.status().listening);
        assert_eq!(log.stops(), 1);

        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;
        assert_eq!(ctrl.mode(), ModeState::Listening);
        assert_eq!(log.starts(), 2);
    }

    #[tokio::test]
    async fn test_detection_after_disable_is_dropped() {
        let (mut ctrl, _) = controller(true);
        ctrl.handle_engine_event(EngineEvent::Ready(true)).await;
        assert!(ctrl.handle_engine_event(EngineEvent::Detected).await);

        ctrl.set_enabled(false).await;
        assert!(!ctrl.handle_engine_event(EngineEvent::Detected).await);
    }
}
