//! Events module for control panel activity
//!
//! Provides structured event types broadcast to subscribed front ends
//! whenever the panel starts or finishes an action.

use serde::{Deserialize, Serialize};

use crate::hotkey::KeySequence;
use crate::panel::Scenario;

/// Events emitted by the control panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    /// A scenario switch was requested and is waiting for authentication
    ScenarioRequested { mode: Scenario },

    /// A cooler boost change was requested
    CoolerBoostRequested { enabled: bool },

    /// A scenario shortcut fired
    ShortcutActivated {
        mode: Scenario,
        /// Whether it came from the global grab rather than a focused window
        global: bool,
    },

    /// A scenario shortcut was rebound
    ShortcutUpdated {
        mode: Scenario,
        sequence: KeySequence,
        /// Whether the new sequence holds a global grab
        global: bool,
    },

    /// A privileged action completed
    ActionFinished { success: bool, message: String },
}

impl std::fmt::Display for PanelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelEvent::ScenarioRequested { mode } => write!(f, "SCENARIO_REQUESTED ({})", mode),
            PanelEvent::CoolerBoostRequested { enabled } => {
                write!(f, "COOLER_BOOST_REQUESTED ({})", if *enabled { "on" } else { "off" })
            }
            PanelEvent::ShortcutActivated { mode, global } => {
                write!(
                    f,
                    "SHORTCUT_ACTIVATED ({}, {})",
                    mode,
                    if *global { "global" } else { "focused" }
                )
            }
            PanelEvent::ShortcutUpdated { mode, sequence, .. } => {
                write!(f, "SHORTCUT_UPDATED ({} = {})", mode, sequence)
            }
            PanelEvent::ActionFinished { success, message } => {
                write!(
                    f,
                    "ACTION_{} ({})",
                    if *success { "SUCCEEDED" } else { "FAILED" },
                    message
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PanelEvent::ShortcutUpdated {
            mode: Scenario::Turbo,
            sequence: "Ctrl+Alt+T".parse().unwrap(),
            global: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("shortcut_updated"));
        assert!(json.contains("\"turbo\""));
        assert!(json.contains("Ctrl+Alt+T"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"scenario_requested","mode":"eco"}"#;
        let event: PanelEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, PanelEvent::ScenarioRequested { mode: Scenario::Eco });
    }

    #[test]
    fn test_event_display() {
        let event = PanelEvent::ActionFinished {
            success: false,
            message: "Action failed.".to_string(),
        };
        assert_eq!(event.to_string(), "ACTION_FAILED (Action failed.)");
    }
}
