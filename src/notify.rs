//! Transient desktop notifications

use tokio::process::Command;
use tracing::{debug, warn};

/// How long a notification stays on screen
pub const NOTIFICATION_TIMEOUT_MS: u32 = 3000;

/// Displays a transient notification
pub trait Notifier {
    fn notify(&self, title: &str, message: &str);
}

/// Sends notifications through a `notify-send` compatible helper
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: String,
}

impl DesktopNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        let spawned = Command::new(&self.program)
            .arg("--expire-time")
            .arg(NOTIFICATION_TIMEOUT_MS.to_string())
            .arg(title)
            .arg(message)
            .spawn();

        match spawned {
            Ok(mut child) => {
                tokio::spawn(async move {
                    if let Err(e) = child.wait().await {
                        debug!(%e, "notification helper wait failed");
                    }
                });
            }
            Err(e) => warn!(program = %self.program, %e, "failed to show notification"),
        }
    }
}

/// Keeps notifications in memory instead of showing them
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((title.to_string(), message.to_string()));
        }
    }
}
