//! Wake word / microphone bridge
//!
//! Owns every piece of listening-cycle state and processes inputs strictly in
//! arrival order on a single task:
//!
//! 1. Wake word mode armed (enabled and ready) -> mute the mic once
//! 2. Wake word detected -> forwarded; the client unmutes the mic
//! 3. User speaks, agent answers
//! 4. Agent back to listening -> mute after the grace delay

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::agent_errors::AgentErrorMonitor;
use super::auto_mute::AutoMuteCoordinator;
use crate::events::{AgentState, BridgeEvent, MuteReason};
use crate::mic::MicrophoneControl;
use crate::wake::{EngineEvent, WakeWordModeController, WakeWordStatus};

/// Inputs from the UI, the agent session, the microphone and the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeInput {
    /// User toggled wake word mode
    SetEnabled(bool),
    /// Manual engine start
    StartListening,
    /// Manual engine stop
    StopListening,
    /// Agent session changed phase
    AgentState {
        state: AgentState,
        failure_reasons: Vec<String>,
    },
    /// Agent session connected or dropped
    Connection(bool),
    /// Microphone state changed; the capability holds the new value
    MicChanged,
    /// Keyword engine reported something
    Engine(EngineEvent),
}

pub struct WakeWordMicBridge {
    mode: WakeWordModeController,
    auto_mute: AutoMuteCoordinator,
    mic: Arc<dyn MicrophoneControl>,
    agent_errors: AgentErrorMonitor,
    agent_state: AgentState,
    /// Last observed (enabled && ready), for edge detection
    armed: bool,
    last_status: WakeWordStatus,
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl WakeWordMicBridge {
    pub fn new(
        mode: WakeWordModeController,
        mic: Arc<dyn MicrophoneControl>,
        grace_delay: Duration,
        event_tx: broadcast::Sender<BridgeEvent>,
    ) -> Self {
        let hook_tx = event_tx.clone();
        let mut auto_mute =
            AutoMuteCoordinator::new(Arc::clone(&mic), grace_delay).with_on_muted(move || {
                info!("agent finished, resuming wake word listening");
                let _ = hook_tx.send(BridgeEvent::MicMuted {
                    reason: MuteReason::AutoMute,
                });
                let _ = hook_tx.send(BridgeEvent::ListeningResumed);
            });
        auto_mute.set_enabled(mode.is_enabled());

        let last_status = mode.status();
        Self {
            mode,
            auto_mute,
            mic,
            agent_errors: AgentErrorMonitor::new(),
            agent_state: AgentState::default(),
            armed: false,
            last_status,
            event_tx,
        }
    }

    pub fn status(&self) -> WakeWordStatus {
        self.mode.status()
    }

    /// Run until the input channel closes
    pub async fn run(mut self, mut input_rx: mpsc::Receiver<BridgeInput>) {
        info!(status = ?self.last_status, "bridge started");

        loop {
            let deadline = self.auto_mute.deadline();
            tokio::select! {
                biased;

                input = input_rx.recv() => match input {
                    Some(input) => self.handle(input).await,
                    None => break,
                },

                _ = sleep_until(deadline) => {
                    self.auto_mute.fire().await;
                }
            }
        }

        self.shutdown().await;
        info!("bridge stopped");
    }

    /// Process one input to completion
    pub async fn handle(&mut self, input: BridgeInput) {
        debug!(?input, "bridge input");

        match input {
            BridgeInput::SetEnabled(enabled) => self.mode.set_enabled(enabled).await,
            BridgeInput::StartListening => self.mode.start_listening().await,
            BridgeInput::StopListening => self.mode.stop_listening().await,
            BridgeInput::Engine(event) => {
                if self.mode.handle_engine_event(event).await {
                    let _ = self.event_tx.send(BridgeEvent::WakeWordDetected);
                }
            }
            BridgeInput::Connection(connected) => {
                info!(connected, "agent session connection changed");
                self.agent_errors.set_connected(connected);
            }
            BridgeInput::AgentState {
                state,
                failure_reasons,
            } => {
                if state != self.agent_state {
                    info!(from = %self.agent_state, to = %state, "agent state");
                }
                self.agent_state = state;
                if let Some(alert) = self.agent_errors.observe(state, &failure_reasons) {
                    let _ = self.event_tx.send(BridgeEvent::SessionEnded {
                        title: alert.title,
                        reasons: alert.reasons,
                    });
                }
                self.evaluate_cycle().await;
            }
            BridgeInput::MicChanged => self.evaluate_cycle().await,
        }

        self.sync_mode().await;
        self.publish_status();
    }

    /// Update "user spoke" and let the coordinator react.
    /// Speech is tracked in every mode so enabling mid-turn sees it.
    async fn evaluate_cycle(&mut self) {
        if !self.mic.is_enabled() {
            self.auto_mute.clear_user_spoke();
        } else if self.agent_state == AgentState::Thinking {
            self.auto_mute.note_user_spoke();
        }

        // No turn from the user yet (e.g. wake word greeting): keep the mic open
        let skip = !self.auto_mute.has_user_spoken();
        self.auto_mute.evaluate(self.agent_state, skip).await;
    }

    /// Follow wake word mode changes. Mutes on the armed edge only, never on
    /// mic changes, so manual unmutes during a conversation are left alone.
    async fn sync_mode(&mut self) {
        let was_enabled = self.auto_mute.is_enabled();
        self.auto_mute.set_enabled(self.mode.is_enabled());
        if self.auto_mute.is_enabled() && !was_enabled {
            // Pick up a turn already in progress
            self.evaluate_cycle().await;
        }

        let armed = self.mode.status().is_armed();
        let rising = armed && !self.armed;
        self.armed = armed;

        if rising && self.mic.is_enabled() {
            info!("wake word mode armed, muting mic");
            match self.mic.toggle(false).await {
                Ok(()) => {
                    let _ = self.event_tx.send(BridgeEvent::MicMuted {
                        reason: MuteReason::WakeWordEnabled,
                    });
                }
                Err(e) => warn!(error = %e, "could not mute mic for wake word mode"),
            }
        }
    }

    fn publish_status(&mut self) {
        let status = self.mode.status();
        if status != self.last_status {
            debug!(?status, "wake word status changed");
            self.last_status = status.clone();
            let _ = self.event_tx.send(BridgeEvent::StatusChanged(status));
        }
    }

    async fn shutdown(&mut self) {
        self.auto_mute.set_enabled(false);
        self.mode.shutdown().await;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
