//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::PanelEvent;
use crate::hotkey::KeySequence;
use crate::panel::{PanelCommand, PanelStatus, Scenario};

/// Largest frame either side accepts
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from a front end to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request the current panel status
    GetStatus,

    /// Switch the performance scenario
    SetScenario { mode: Scenario },

    /// Turn cooler boost on or off
    SetCoolerBoost { enabled: bool },

    /// Rebind a scenario's shortcut ("" unbinds)
    SetShortcut { mode: Scenario, sequence: KeySequence },

    /// Key press seen by the front end's focused window
    KeyPressed { sequence: KeySequence },

    /// Re-read state from the driver
    Refresh,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to panel event notifications
    Subscribe,
}

impl Request {
    /// Panel command this request maps to, if it mutates the panel
    pub fn to_command(&self) -> Option<PanelCommand> {
        match self {
            Request::SetScenario { mode } => Some(PanelCommand::SetScenario(*mode)),
            Request::SetCoolerBoost { enabled } => Some(PanelCommand::SetCoolerBoost(*enabled)),
            Request::SetShortcut { mode, sequence } => Some(PanelCommand::SetShortcut {
                mode: *mode,
                sequence: *sequence,
            }),
            Request::KeyPressed { sequence } => Some(PanelCommand::KeyPressed(*sequence)),
            Request::Refresh => Some(PanelCommand::Refresh),
            Request::GetStatus | Request::Ping | Request::Subscribe => None,
        }
    }
}

/// Responses from the daemon to a front end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current panel status
    Status(PanelStatus),

    /// Command queued for the panel
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed front ends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Panel event occurred
    Event { event: PanelEvent },
}
