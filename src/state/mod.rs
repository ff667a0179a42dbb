//! Listening cycle state
//!
//! - AutoMuteCoordinator: mutes the mic after the agent answers
//! - AgentErrorMonitor: flags sessions whose agent never became usable
//! - WakeWordMicBridge: wires wake word mode, agent state and the mic together

mod agent_errors;
mod auto_mute;
mod bridge;

pub use bridge::{BridgeInput, WakeWordMicBridge};
