//! Control panel module
//!
//! Provides the scenario/cooler-boost controller that front ends drive
//! over the control socket, plus the persisted shortcut bindings:
//! - Scenarios: Eco, Comfort, Turbo (written to `shift_mode`)
//! - Cooler boost toggle (written to `cooler_boost`)
//! - One global shortcut per scenario, with a focused-window fallback

mod controller;
mod scenario;
mod store;

pub use controller::{ControlPanel, PanelCommand, PanelServices, PanelStatus};
pub use scenario::Scenario;
pub use store::{default_shortcuts, load_shortcuts};
