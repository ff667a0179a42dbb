//! IPC module for daemon-client communication

mod protocol;
mod server;

pub use protocol::Notification;
pub use server::{BridgeLink, Server};
