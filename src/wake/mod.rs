//! Wake word module
//!
//! Wraps an opaque keyword-spotting engine behind an adapter with scoped
//! audio capture ownership, and drives it from the user's enable toggle.

mod adapter;
mod engine;
mod mode;
mod remote;

pub use adapter::{AudioCapture, WakeWordEngineAdapter};
pub use engine::EngineEvent;
pub use mode::{WakeWordModeController, WakeWordStatus};
pub use remote::RemoteWakeEngine;

#[cfg(test)]
pub(crate) use engine::fake;
#[cfg(test)]
pub(crate) use mode::ModeState;
