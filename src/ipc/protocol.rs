//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::{AgentState, BridgeEvent};
use crate::state::BridgeInput;
use crate::wake::{EngineEvent, WakeWordStatus};

/// Requests from the client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to events and capability commands
    Subscribe,

    /// Toggle wake word mode
    SetEnabled { enabled: bool },

    /// Manually start the keyword engine
    StartListening,

    /// Manually stop the keyword engine
    StopListening,

    /// Agent session changed phase
    AgentState {
        state: AgentState,
        #[serde(default)]
        failure_reasons: Vec<String>,
    },

    /// Agent session connected or dropped
    Connection { connected: bool },

    /// Microphone state as seen by the client
    MicState { enabled: bool },

    /// Keyword engine readiness, with an error if loading failed
    EngineStatus {
        ready: bool,
        #[serde(default)]
        error: Option<String>,
    },

    /// Keyword engine heard the wake word
    WakeDetected,
}

impl Request {
    /// Bridge inputs carried by this request, in order
    pub fn into_inputs(self) -> Vec<BridgeInput> {
        match self {
            Request::SetEnabled { enabled } => vec![BridgeInput::SetEnabled(enabled)],
            Request::StartListening => vec![BridgeInput::StartListening],
            Request::StopListening => vec![BridgeInput::StopListening],
            Request::AgentState {
                state,
                failure_reasons,
            } => vec![BridgeInput::AgentState {
                state,
                failure_reasons,
            }],
            Request::Connection { connected } => vec![BridgeInput::Connection(connected)],
            Request::MicState { .. } => vec![BridgeInput::MicChanged],
            Request::EngineStatus { ready, error } => {
                let mut inputs = vec![BridgeInput::Engine(EngineEvent::Ready(ready))];
                if let Some(message) = error {
                    inputs.push(BridgeInput::Engine(EngineEvent::Error(message)));
                }
                inputs
            }
            Request::WakeDetected => vec![BridgeInput::Engine(EngineEvent::Detected)],
            Request::GetStatus | Request::Ping | Request::Subscribe => Vec::new(),
        }
    }
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Request queued for the bridge
    Accepted,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Bridge event occurred
    Event { event: BridgeEvent },

    /// Switch the session microphone
    SetMicrophone { enabled: bool },

    /// Start or stop the client-side keyword engine
    EngineCommand {
        listen: bool,
        keyword_path: String,
        sensitivity: f32,
    },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether wake word mode is configured at all
    pub available: bool,

    /// Wake word mode as the UI shows it
    pub wake_word: WakeWordStatus,

    /// Last agent state received
    pub agent_state: AgentState,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            available: false,
            wake_word: WakeWordStatus::default(),
            agent_state: AgentState::default(),
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetEnabled { enabled: true };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_enabled"));
        assert!(json.contains("true"));
    }

    #[test]
    fn test_agent_state_request_defaults() {
        let json = r#"{"type":"agent_state","state":"speaking"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::AgentState {
                state: AgentState::Speaking,
                failure_reasons: Vec::new(),
            }
        );
    }

    #[test]
    fn test_engine_status_with_error_maps_to_two_inputs() {
        let json = r#"{"type":"engine_status","ready":false,"error":"invalid access key"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req.into_inputs(),
            vec![
                BridgeInput::Engine(EngineEvent::Ready(false)),
                BridgeInput::Engine(EngineEvent::Error("invalid access key".into())),
            ]
        );
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("wake_word"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::Event {
            event: BridgeEvent::WakeWordDetected,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(json, r#"{"type":"event","event":{"type":"wake_word_detected"}}"#);
    }
}
