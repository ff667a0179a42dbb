//! Auto-mute after the agent finishes answering
//!
//! Tracks one conversational cycle at a time. When the agent goes back to
//! listening after thinking or speaking, the microphone is muted after a grace
//! delay unless the user starts a new utterance first.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::AgentState;
use crate::mic::MicrophoneControl;

/// Per-cycle bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteCycleState {
    /// Agent thought or spoke since the last return to listening
    pub was_agent_active: bool,
    /// User said something while the mic was open this cycle
    pub has_user_spoken: bool,
    /// Deadline of the scheduled mute, at most one
    pub pending_mute: Option<Instant>,
}

type MutedHook = Box<dyn FnMut() + Send>;

/// Schedules and executes the mute that closes a cycle
pub struct AutoMuteCoordinator {
    mic: Arc<dyn MicrophoneControl>,
    delay: Duration,
    enabled: bool,
    cycle: MuteCycleState,
    on_muted: Option<MutedHook>,
}

impl AutoMuteCoordinator {
    pub fn new(mic: Arc<dyn MicrophoneControl>, delay: Duration) -> Self {
        Self {
            mic,
            delay,
            enabled: false,
            cycle: MuteCycleState::default(),
            on_muted: None,
        }
    }

    /// Called after every successful auto-mute
    pub fn with_on_muted(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_muted = Some(Box::new(hook));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(test)]
    pub fn cycle(&self) -> &MuteCycleState {
        &self.cycle
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.cycle.pending_mute
    }

    pub fn has_user_spoken(&self) -> bool {
        self.cycle.has_user_spoken
    }

    pub fn note_user_spoke(&mut self) {
        if !self.cycle.has_user_spoken {
            debug!("user spoke this cycle");
        }
        self.cycle.has_user_spoken = true;
    }

    pub fn clear_user_spoke(&mut self) {
        self.cycle.has_user_spoken = false;
    }

    /// Enable or disable. Disabling drops the cycle and any pending mute;
    /// whether the user spoke is kept since it follows the mic, not the mode.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            if self.cycle.pending_mute.is_some() {
                info!("auto-mute disabled, canceling pending mute");
            }
            self.cycle = MuteCycleState {
                has_user_spoken: self.cycle.has_user_spoken,
                ..MuteCycleState::default()
            };
        }
    }

    /// Re-evaluate the cycle against the latest agent state.
    ///
    /// `skip` suppresses the mute for this return to listening only.
    pub async fn evaluate(&mut self, agent_state: AgentState, skip: bool) {
        if !self.enabled {
            return;
        }

        if agent_state.is_active() {
            self.cycle.was_agent_active = true;
            if agent_state == AgentState::Thinking && self.cycle.pending_mute.take().is_some() {
                info!("user spoke during grace delay, canceling auto-mute");
            }
        }

        if agent_state != AgentState::Listening || !self.cycle.was_agent_active {
            return;
        }

        if skip {
            info!("skipping auto-mute for this turn");
            self.cycle.was_agent_active = false;
            return;
        }

        if !self.mic.is_enabled() {
            return;
        }

        self.cycle.was_agent_active = false;
        self.cycle.pending_mute = None;

        if self.delay.is_zero() {
            info!("agent finished, muting mic");
            self.mute().await;
        } else {
            info!(delay_ms = self.delay.as_millis() as u64, "agent finished, scheduling mute");
            self.cycle.pending_mute = Some(Instant::now() + self.delay);
        }
    }

    /// Run the scheduled mute if its deadline has passed
    pub async fn fire(&mut self) {
        let Some(deadline) = self.cycle.pending_mute else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        self.cycle.pending_mute = None;

        if !self.enabled {
            debug!("auto-mute fired after disable, ignoring");
            return;
        }

        info!("grace delay elapsed, muting mic");
        self.mute().await;
    }

    async fn mute(&mut self) {
        match self.mic.toggle(false).await {
            Ok(()) => {
                self.cycle.has_user_spoken = false;
                if let Some(hook) = self.on_muted.as_mut() {
                    hook();
                }
            }
            Err(e) => {
                // Left as-is so the next agent transition can retry
                warn!(error = %e, "auto-mute toggle failed");
            }
        }
    }
}
