//! Events module for the listening cycle
//!
//! Provides the agent state reported by the conversational session and the
//! structured events the bridge emits as the cycle advances.

use serde::{Deserialize, Serialize};

use crate::wake::WakeWordStatus;

/// Conversational phase reported by the agent session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Connected, nothing happening
    #[default]
    Idle,
    /// Waiting for the user to speak
    Listening,
    /// User utterance received, response being generated
    Thinking,
    /// Agent audio is playing
    Speaking,
    /// Agent could not be reached or crashed
    Failed,
}

impl AgentState {
    /// Agent is processing or answering a turn
    pub fn is_active(self) -> bool {
        matches!(self, AgentState::Thinking | AgentState::Speaking)
    }

    /// Agent has been seen doing real work at least once
    pub fn is_working(self) -> bool {
        matches!(
            self,
            AgentState::Listening | AgentState::Thinking | AgentState::Speaking
        )
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Listening => write!(f, "listening"),
            AgentState::Thinking => write!(f, "thinking"),
            AgentState::Speaking => write!(f, "speaking"),
            AgentState::Failed => write!(f, "failed"),
        }
    }
}

/// Why the bridge muted the microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuteReason {
    /// Wake word mode just became active
    WakeWordEnabled,
    /// Agent finished its answer and the grace delay ran out
    AutoMute,
}

/// Events emitted by the bridge while driving the listening cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Wake word mode status changed
    StatusChanged(WakeWordStatus),

    /// Wake word heard while the mode was enabled
    WakeWordDetected,

    /// Microphone was muted by the bridge
    MicMuted {
        reason: MuteReason,
    },

    /// Auto-mute completed, back to passive wake word listening
    ListeningResumed,

    /// Agent failed before it ever became usable; the client should end the session
    SessionEnded {
        title: String,
        reasons: Vec<String>,
    },
}

impl std::fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeEvent::StatusChanged(status) => write!(f, "STATUS_CHANGED ({})", status.mode),
            BridgeEvent::WakeWordDetected => write!(f, "WAKE_WORD_DETECTED"),
            BridgeEvent::MicMuted { reason } => write!(f, "MIC_MUTED ({:?})", reason),
            BridgeEvent::ListeningResumed => write!(f, "LISTENING_RESUMED"),
            BridgeEvent::SessionEnded { reasons, .. } => {
                write!(f, "SESSION_ENDED ({} reasons)", reasons.len())
            }
        }
    }
}
