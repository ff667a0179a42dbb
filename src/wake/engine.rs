//! Keyword-spotting engine boundary
//!
//! The acoustic model is opaque: the bridge only drives its lifecycle and
//! consumes the events it reports.

use async_trait::async_trait;

/// Errors reported by a wake word engine or its adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("wake word engine failed to start: {0}")]
    Init(String),

    #[error("audio capture is held by another listener")]
    CaptureBusy,

    #[error("wake word engine failed to stop: {0}")]
    Stop(String),
}

/// Signals delivered by the engine outside of start/stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine readiness changed (model loaded, credentials accepted)
    Ready(bool),
    /// Keyword heard; one event per acoustic trigger
    Detected,
    /// Engine failed after start
    Error(String),
}

/// An external keyword-spotting engine
#[async_trait]
pub trait WakeWordEngine: Send {
    /// Begin keyword spotting
    async fn start(&mut self) -> Result<(), EngineError>;

    /// Stop keyword spotting
    async fn stop(&mut self) -> Result<(), EngineError>;
}
