//! Embedded controller attributes exposed by the msi-ec driver

use std::path::{Path, PathBuf};

use tracing::debug;

/// Attribute holding the active shift mode / scenario
pub const SHIFT_MODE: &str = "shift_mode";
/// Attribute holding the cooler boost state ("on" / "off")
pub const COOLER_BOOST: &str = "cooler_boost";

/// Read and build writes for the driver's virtual files
#[derive(Debug, Clone)]
pub struct EcAttributes {
    dir: PathBuf,
}

impl EcAttributes {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, attribute: &str) -> PathBuf {
        self.dir.join(attribute)
    }

    /// Trimmed contents of an attribute, or empty if it can't be read
    pub fn read(&self, attribute: &str) -> String {
        read_state_file(&self.path(attribute))
    }

    /// Shell command that writes `value` into an attribute
    pub fn write_command(&self, attribute: &str, value: &str) -> String {
        format!("echo {} | tee {}", value, self.path(attribute).display())
    }
}

/// Trimmed textual contents of `path`, empty on any failure
pub fn read_state_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.trim().to_string(),
        Err(e) => {
            debug!(?path, %e, "state file unreadable");
            String::new()
        }
    }
}
