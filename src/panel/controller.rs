//! Control panel core
//!
//! Owns one `GlobalShortcut` per scenario, turns user actions into
//! privileged writes to the embedded controller and keeps the status
//! snapshot front ends display.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::ec::{EcAttributes, COOLER_BOOST, SHIFT_MODE};
use crate::events::PanelEvent;
use crate::hotkey::{GlobalShortcut, KeySequence, ShortcutContext};
use crate::notify::Notifier;
use crate::privileged::{CommandOutcome, CommandRunner};

use super::scenario::Scenario;
use super::store::{save_shortcuts, ShortcutMap};

/// Title used for every desktop notification
pub const NOTIFICATION_TITLE: &str = "MSI Control";

const WAITING_MESSAGE: &str = "Waiting for authentication...";
const GENERIC_SUCCESS: &str = "Action completed successfully.";
const GENERIC_FAILURE: &str = "Action failed.";

/// Work items processed on the panel's task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    SetScenario(Scenario),
    SetCoolerBoost(bool),
    SetShortcut {
        mode: Scenario,
        sequence: KeySequence,
    },
    /// A global grab for this scenario fired
    ShortcutActivated(Scenario),
    /// A front end saw this key press in its focused window
    KeyPressed(KeySequence),
    Refresh,
    /// A privileged action finished; `None` if it could not be launched
    CommandFinished {
        id: u64,
        outcome: Option<CommandOutcome>,
    },
}

/// Per-scenario shortcut state shown to front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutStatus {
    pub sequence: KeySequence,
    /// Whether a global grab is held for it
    pub global: bool,
}

/// Snapshot of everything a front end renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStatus {
    /// Status line text
    pub message: String,
    /// Scenario last read back from the driver
    pub scenario: Option<String>,
    pub cooler_boost: bool,
    pub shortcuts: BTreeMap<Scenario, ShortcutStatus>,
    pub global_shortcuts_supported: bool,
    pub pending_actions: usize,
}

impl Default for PanelStatus {
    fn default() -> Self {
        Self {
            message: "Ready to switch scenarios.".to_string(),
            scenario: None,
            cooler_boost: false,
            shortcuts: BTreeMap::new(),
            global_shortcuts_supported: false,
            pending_actions: 0,
        }
    }
}

/// Side-effecting collaborators of the panel
pub struct PanelServices {
    pub runner: Arc<dyn CommandRunner>,
    pub notifier: Box<dyn Notifier>,
}

/// The control panel
pub struct ControlPanel {
    ec: EcAttributes,
    services: PanelServices,
    shortcuts: BTreeMap<Scenario, GlobalShortcut>,
    shortcuts_file: Option<PathBuf>,
    command_tx: mpsc::UnboundedSender<PanelCommand>,
    event_tx: broadcast::Sender<PanelEvent>,
    pending: HashMap<u64, String>,
    next_action: u64,
    status: PanelStatus,
}

impl ControlPanel {
    /// Create the panel and bind every scenario's shortcut
    ///
    /// Activations and finished commands are fed back through `command_tx`.
    pub fn new(
        ec: EcAttributes,
        context: &Rc<ShortcutContext>,
        initial_shortcuts: ShortcutMap,
        services: PanelServices,
        command_tx: mpsc::UnboundedSender<PanelCommand>,
        event_tx: broadcast::Sender<PanelEvent>,
    ) -> Self {
        let mut shortcuts = BTreeMap::new();
        let mut supported = false;
        for mode in Scenario::ALL {
            let mut shortcut = GlobalShortcut::new(context);
            let tx = command_tx.clone();
            shortcut.connect_activated(move || {
                let _ = tx.send(PanelCommand::ShortcutActivated(mode));
            });
            let sequence = initial_shortcuts
                .get(&mode)
                .copied()
                .unwrap_or_else(|| mode.default_shortcut());
            shortcut.set_shortcut(sequence);
            supported = shortcut.is_supported();
            shortcuts.insert(mode, shortcut);
        }

        let mut panel = Self {
            ec,
            services,
            shortcuts,
            shortcuts_file: None,
            command_tx,
            event_tx,
            pending: HashMap::new(),
            next_action: 0,
            status: PanelStatus {
                global_shortcuts_supported: supported,
                ..PanelStatus::default()
            },
        };
        panel.sync_shortcut_status();
        panel.refresh_state();
        panel
    }

    /// Persist shortcut changes to `path`
    pub fn set_shortcuts_file(&mut self, path: PathBuf) {
        self.shortcuts_file = Some(path);
    }

    pub fn status(&self) -> &PanelStatus {
        &self.status
    }

    /// Process one command
    pub fn handle(&mut self, command: PanelCommand) {
        debug!(?command, "panel command");
        match command {
            PanelCommand::SetScenario(mode) => self.set_scenario(mode),
            PanelCommand::SetCoolerBoost(enabled) => self.set_cooler_boost(enabled),
            PanelCommand::SetShortcut { mode, sequence } => self.update_shortcut(mode, sequence),
            PanelCommand::ShortcutActivated(mode) => {
                info!(%mode, "global shortcut activated");
                self.emit(PanelEvent::ShortcutActivated { mode, global: true });
                self.set_scenario(mode);
            }
            PanelCommand::KeyPressed(sequence) => {
                self.handle_focused_key(sequence);
            }
            PanelCommand::Refresh => self.refresh_state(),
            PanelCommand::CommandFinished { id, outcome } => self.finish_command(id, outcome),
        }
    }

    /// Switch the shift mode through the privileged runner
    pub fn set_scenario(&mut self, mode: Scenario) {
        let command = self.ec.write_command(SHIFT_MODE, mode.as_str());
        self.emit(PanelEvent::ScenarioRequested { mode });
        self.run_command(command, format!("Scenario switched to {}.", mode));
    }

    /// Turn cooler boost on or off
    pub fn set_cooler_boost(&mut self, enabled: bool) {
        let value = if enabled { "on" } else { "off" };
        let command = self.ec.write_command(COOLER_BOOST, value);
        let message = if enabled {
            "Cooler boost enabled."
        } else {
            "Cooler boost disabled."
        };
        self.status.cooler_boost = enabled;
        self.emit(PanelEvent::CoolerBoostRequested { enabled });
        self.run_command(command, message.to_string());
    }

    /// Rebind a scenario's shortcut
    pub fn update_shortcut(&mut self, mode: Scenario, sequence: KeySequence) {
        let Some(shortcut) = self.shortcuts.get_mut(&mode) else {
            return;
        };
        shortcut.set_shortcut(sequence);
        let global = shortcut.is_registered();

        self.sync_shortcut_status();
        self.status.message = format!("Shortcut updated for {}.", mode);
        self.emit(PanelEvent::ShortcutUpdated {
            mode,
            sequence,
            global,
        });
        self.persist_shortcuts();
    }

    /// Focused-window fallback: fire the scenario bound to `sequence`
    ///
    /// Returns the scenario that was triggered, if any.
    pub fn handle_focused_key(&mut self, sequence: KeySequence) -> Option<Scenario> {
        if sequence.is_empty() {
            return None;
        }
        let mode = self
            .shortcuts
            .iter()
            .find(|(_, shortcut)| shortcut.shortcut() == sequence)
            .map(|(mode, _)| *mode)?;

        self.emit(PanelEvent::ShortcutActivated {
            mode,
            global: false,
        });
        self.set_scenario(mode);
        Some(mode)
    }

    /// Re-read scenario and cooler boost from the driver
    pub fn refresh_state(&mut self) {
        let shift_mode = self.ec.read(SHIFT_MODE);
        if !shift_mode.is_empty() {
            self.status.message = format!("Current scenario: {}", shift_mode);
            self.status.scenario = Some(shift_mode);
        }

        let cooler_boost = self.ec.read(COOLER_BOOST);
        if !cooler_boost.is_empty() {
            self.status.cooler_boost = cooler_boost == "on";
        }
    }

    fn run_command(&mut self, command: String, success_message: String) {
        let id = self.next_action;
        self.next_action += 1;
        self.pending.insert(id, success_message);
        self.status.pending_actions = self.pending.len();
        self.status.message = WAITING_MESSAGE.to_string();

        let runner = Arc::clone(&self.services.runner);
        let tx = self.command_tx.clone();
        tokio::spawn(async move {
            let outcome = match runner.run(&command).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(?e, "privileged command failed to start");
                    None
                }
            };
            let _ = tx.send(PanelCommand::CommandFinished { id, outcome });
        });
    }

    fn finish_command(&mut self, id: u64, outcome: Option<CommandOutcome>) {
        let pending = self.pending.remove(&id);
        let success = outcome.is_some_and(|outcome| outcome.success());
        let message = match (success, pending) {
            (true, Some(message)) => message,
            (true, None) => GENERIC_SUCCESS.to_string(),
            (false, _) => GENERIC_FAILURE.to_string(),
        };

        info!(id, success, %message, "action finished");
        self.status.pending_actions = self.pending.len();
        self.status.message = message.clone();
        self.services.notifier.notify(NOTIFICATION_TITLE, &message);
        self.emit(PanelEvent::ActionFinished { success, message });

        self.refresh_state();
    }

    fn sync_shortcut_status(&mut self) {
        self.status.shortcuts = self
            .shortcuts
            .iter()
            .map(|(mode, shortcut)| {
                (
                    *mode,
                    ShortcutStatus {
                        sequence: shortcut.shortcut(),
                        global: shortcut.is_registered(),
                    },
                )
            })
            .collect();
    }

    fn persist_shortcuts(&self) {
        let Some(path) = &self.shortcuts_file else {
            return;
        };
        let map: ShortcutMap = self
            .shortcuts
            .iter()
            .map(|(mode, shortcut)| (*mode, shortcut.shortcut()))
            .collect();
        if let Err(e) = save_shortcuts(path, &map) {
            warn!(?e, "failed to save shortcuts");
        }
    }

    fn emit(&self, event: PanelEvent) {
        debug!(%event, "emitting panel event");
        let _ = self.event_tx.send(event);
    }
}
