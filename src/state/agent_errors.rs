//! Surfaces agent failures that happen before the agent ever worked
//!
//! Joining a room where the agent is already running from another device can
//! report `failed` while waiting for transitions that never come. Once the
//! agent has been seen working in this session, later failures stay quiet.
//! The flag lives as long as the monitor; only a new session resets it.

use tracing::warn;

use crate::events::AgentState;

pub const SESSION_ENDED_TITLE: &str = "Session ended";

/// Alert for a session that never got a working agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAlert {
    pub title: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Default)]
pub struct AgentErrorMonitor {
    connected: bool,
    seen_working: bool,
}

impl AgentErrorMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Observe an agent state; returns an alert if the session should end
    pub fn observe(&mut self, state: AgentState, failure_reasons: &[String]) -> Option<SessionAlert> {
        if state.is_working() {
            self.seen_working = true;
        }

        if !self.connected || state != AgentState::Failed || self.seen_working {
            return None;
        }

        warn!(reasons = ?failure_reasons, "agent failed before becoming usable");
        Some(SessionAlert {
            title: SESSION_ENDED_TITLE.to_string(),
            reasons: failure_reasons.to_vec(),
        })
    }
}
