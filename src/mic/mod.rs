//! Microphone capability
//!
//! The bridge never owns microphone hardware. It issues toggle commands and
//! treats `is_enabled` as ground truth, re-reading it before every decision.

mod remote;

use async_trait::async_trait;

pub use remote::RemoteMicrophone;

/// Errors from the microphone capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MicError {
    #[error("microphone toggle rejected: {0}")]
    Toggle(String),
}

/// Something that can switch the session microphone on and off
#[async_trait]
pub trait MicrophoneControl: Send + Sync {
    /// Current microphone state as last reported
    fn is_enabled(&self) -> bool;

    /// Request the microphone be switched to `enabled`
    async fn toggle(&self, enabled: bool) -> Result<(), MicError>;
}
