//! Lifecycle wrapper around a wake word engine
//!
//! Tracks readiness and the last error, makes start/stop idempotent, and
//! holds the exclusive audio capture permit for as long as the engine runs.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::engine::{EngineError, EngineEvent, WakeWordEngine};

/// Exclusive audio capture resource shared by every listener in the process
#[derive(Debug, Clone)]
pub struct AudioCapture {
    permits: Arc<Semaphore>,
}

impl AudioCapture {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the capture without waiting; released when the guard drops
    fn try_acquire(&self) -> Result<CaptureGuard, EngineError> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .map(|permit| CaptureGuard { _permit: permit })
            .map_err(|_| EngineError::CaptureBusy)
    }

    /// Whether nobody currently holds the capture
    #[cfg(test)]
    pub fn is_free(&self) -> bool {
        self.permits.available_permits() == 1
    }
}

impl Default for AudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Held while the engine owns the microphone stream
#[derive(Debug)]
struct CaptureGuard {
    _permit: OwnedSemaphorePermit,
}

/// What the adapter wants the mode controller to know about an engine event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSignal {
    ReadyChanged(bool),
    Detected,
    Failed(String),
}

/// Wraps an engine with idempotent lifecycle and scoped capture ownership
pub struct WakeWordEngineAdapter {
    engine: Box<dyn WakeWordEngine>,
    capture: AudioCapture,
    guard: Option<CaptureGuard>,
    ready: bool,
    last_error: Option<String>,
}

impl WakeWordEngineAdapter {
    pub fn new(engine: Box<dyn WakeWordEngine>, capture: AudioCapture) -> Self {
        Self {
            engine,
            capture,
            guard: None,
            ready: false,
            last_error: None,
        }
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Engine is running and owns the capture
    pub fn is_listening(&self) -> bool {
        self.guard.is_some()
    }

    /// Start the engine. No-op if already listening.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        if self.is_listening() {
            debug!("wake word engine already listening");
            return Ok(());
        }

        // Dropped on every early exit, including cancellation of this future
        let guard = self.capture.try_acquire().inspect_err(|e| {
            self.last_error = Some(e.to_string());
        })?;

        match self.engine.start().await {
            Ok(()) => {
                self.guard = Some(guard);
                self.last_error = None;
                info!("wake word engine listening");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "wake word engine failed to start");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Stop the engine. Releases the capture even if the engine reports failure.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        let Some(guard) = self.guard.take() else {
            debug!("wake word engine already stopped");
            return Ok(());
        };

        let result = self.engine.stop().await;
        drop(guard);

        match &result {
            Ok(()) => info!("wake word engine stopped"),
            Err(e) => warn!(error = %e, "wake word engine stop failed, capture released"),
        }
        result
    }

    /// Fold an engine event into adapter state
    pub fn handle_event(&mut self, event: EngineEvent) -> AdapterSignal {
        match event {
            EngineEvent::Ready(ready) => {
                if ready != self.ready {
                    debug!(ready, "wake word engine readiness changed");
                }
                // Errors stay until a successful start or an explicit clear
                self.ready = ready;
                AdapterSignal::ReadyChanged(ready)
            }
            EngineEvent::Detected => AdapterSignal::Detected,
            EngineEvent::Error(message) => {
                warn!(%message, "wake word engine reported error");
                self.last_error = Some(message.clone());
                AdapterSignal::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::wake::engine::fake::{EngineLog, FakeEngine};

    fn adapter() -> (WakeWordEngineAdapter, Arc<EngineLog>, AudioCapture) {
        let (engine, log) = FakeEngine::new();
        let capture = AudioCapture::new();
        (
            WakeWordEngineAdapter::new(Box::new(engine), capture.clone()),
            log,
            capture,
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (mut adapter, log, capture) = adapter();

        assert_ok!(adapter.start().await);
        assert_ok!(adapter.start().await);

        assert_eq!(log.starts(), 1);
        assert!(adapter.is_listening());
        assert!(!capture.is_free());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (mut adapter, log, capture) = adapter();

        assert_ok!(adapter.stop().await);
        assert_eq!(log.stops(), 0);

        assert_ok!(adapter.start().await);
        assert_ok!(adapter.stop().await);
        assert_ok!(adapter.stop().await);

        assert_eq!(log.stops(), 1);
        assert!(capture.is_free());
    }

    #[tokio::test]
    async fn test_failed_start_releases_capture() {
        let (mut adapter, log, capture) = adapter();
        log.fail_start.store(true, Ordering::SeqCst);

        let err = assert_err!(adapter.start().await);
        assert!(matches!(err, EngineError::Init(_)));
        assert!(capture.is_free());
        assert!(!adapter.is_listening());
        assert!(adapter.last_error().unwrap().contains("invalid access key"));
    }

    #[tokio::test]
    async fn test_failed_stop_still_releases_capture() {
        let (mut adapter, log, capture) = adapter();
        assert_ok!(adapter.start().await);
        log.fail_stop.store(true, Ordering::SeqCst);

        assert_err!(adapter.stop().await);
        assert!(capture.is_free());
        assert!(!adapter.is_listening());
    }

    #[tokio::test]
    async fn test_capture_is_exclusive() {
        let capture = AudioCapture::new();
        let (first, _) = FakeEngine::new();
        let (second, second_log) = FakeEngine::new();
        let mut a = WakeWordEngineAdapter::new(Box::new(first), capture.clone());
        let mut b = WakeWordEngineAdapter::new(Box::new(second), capture.clone());

        assert_ok!(a.start().await);
        assert_eq!(b.start().await, Err(EngineError::CaptureBusy));
        assert_eq!(second_log.starts(), 0);

        assert_ok!(a.stop().await);
        assert_ok!(b.start().await);
    }

    #[test]
    fn test_events_update_state() {
        let (mut adapter, _, _) = adapter();

        assert_eq!(
            adapter.handle_event(EngineEvent::Error("model missing".into())),
            AdapterSignal::Failed("model missing".into())
        );
        assert_eq!(adapter.last_error(), Some("model missing"));

        assert_eq!(
            adapter.handle_event(EngineEvent::Ready(true)),
            AdapterSignal::ReadyChanged(true)
        );
        assert!(adapter.ready());
        assert_eq!(adapter.last_error(), Some("model missing"));

        adapter.clear_error();
        assert_eq!(adapter.last_error(), None);

        assert_eq!(adapter.handle_event(EngineEvent::Detected), AdapterSignal::Detected);
    }
}
