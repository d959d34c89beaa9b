//! msi-ctl-daemon: Background daemon for the MSI embedded-controller panel
//!
//! This daemon runs in the user's graphical session and provides:
//! - Scenario (Eco/Comfort/Turbo) and cooler boost control through the
//!   msi-ec driver, with writes elevated via pkexec
//! - Global keyboard shortcuts per scenario via X11 key grabs
//! - IPC server front ends use to drive the panel and follow its status
//!
//! Rendering the panel itself is left to the front end.

mod config;
mod ec;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod notify;
mod panel;
mod privileged;

use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::ec::EcAttributes;
use crate::events::PanelEvent;
use crate::hotkey::{KeyGrabPlatform, NativeEvent, ShortcutContext, UnsupportedPlatform, X11Platform};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::notify::DesktopNotifier;
use crate::panel::{default_shortcuts, load_shortcuts, ControlPanel, PanelCommand, PanelServices};
use crate::privileged::ElevatedShell;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "msi-ctl-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.sysfs_dir, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    // Platform event pump -> event loop
    let (native_tx, mut native_rx) = mpsc::unbounded_channel::<NativeEvent>();
    // Shortcuts, IPC clients and finished commands -> panel
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<PanelCommand>();
    // Panel -> subscribed IPC clients
    let (event_tx, _event_rx) = broadcast::channel::<PanelEvent>(64);

    let platform: Rc<dyn KeyGrabPlatform> = match X11Platform::connect(native_tx) {
        Ok(platform) => Rc::new(platform),
        Err(e) => {
            warn!(%e, "global shortcuts unavailable, front ends must forward key presses");
            Rc::new(UnsupportedPlatform::new(e.to_string()))
        }
    };
    let shortcut_context = ShortcutContext::new(platform);

    let shortcuts = load_shortcuts(&config.shortcuts_file).unwrap_or_else(|e| {
        warn!(?e, "ignoring saved shortcuts");
        default_shortcuts()
    });

    let services = PanelServices {
        runner: Arc::new(ElevatedShell::new(config.elevate_helper.as_str())),
        notifier: Box::new(DesktopNotifier::new(config.notify_helper.as_str())),
    };
    let mut panel = ControlPanel::new(
        EcAttributes::new(&config.sysfs_dir),
        &shortcut_context,
        shortcuts,
        services,
        command_tx.clone(),
        event_tx.clone(),
    );
    panel.set_shortcuts_file(config.shortcuts_file.clone());

    // Create IPC server and publish the initial status
    let server = Arc::new(Server::new(&config.socket_path, command_tx, event_tx)?);
    server.set_status(panel.status().clone()).await;

    let server_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!(?e, "IPC server error");
            }
        })
    };

    info!("daemon initialized, entering main loop");

    // Main event loop; the shortcut core and the panel stay on this task
    loop {
        tokio::select! {
            Some(event) = native_rx.recv() => {
                let handled = shortcut_context.dispatch(&event);
                trace!(?event, handled, "native event");
            }

            Some(command) = command_rx.recv() => {
                panel.handle(command);
                server.set_status(panel.status().clone()).await;
            }

            _ = shutdown.wait() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    // Dropping the panel releases every key grab
    drop(panel);
    server.shutdown().await;
    server_task.abort();

    info!("msi-ctl-daemon stopped");

    Ok(())
}
