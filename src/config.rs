//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default location of the msi-ec driver attributes
pub const DEFAULT_SYSFS_DIR: &str = "/sys/devices/platform/msi-ec";
/// Default elevation helper
pub const DEFAULT_ELEVATE: &str = "pkexec";
/// Default notification helper
pub const DEFAULT_NOTIFY: &str = "notify-send";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket front ends connect to
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Where saved shortcut bindings live
    pub shortcuts_file: PathBuf,

    /// Directory holding `shift_mode` and `cooler_boost`
    pub sysfs_dir: PathBuf,

    /// Program used to run commands as root
    pub elevate_helper: String,

    /// Program used to show desktop notifications
    pub notify_helper: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("msi-ctl");

        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            socket_path: data_dir.join("daemon.sock"),
            shortcuts_file: data_dir.join("shortcuts.json"),
            sysfs_dir: non_empty("MSI_CTL_SYSFS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSFS_DIR)),
            elevate_helper: non_empty("MSI_CTL_ELEVATE")
                .unwrap_or_else(|| DEFAULT_ELEVATE.to_string()),
            notify_helper: non_empty("MSI_CTL_NOTIFY")
                .unwrap_or_else(|| DEFAULT_NOTIFY.to_string()),
            data_dir,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/user")])).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/home/user/.local/share/msi-ctl/daemon.sock")
        );
        assert_eq!(config.sysfs_dir, PathBuf::from(DEFAULT_SYSFS_DIR));
        assert_eq!(config.elevate_helper, "pkexec");
        assert_eq!(config.notify_helper, "notify-send");
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HOME", "/home/user"),
            ("MSI_CTL_SYSFS_DIR", "/tmp/fake-ec"),
            ("MSI_CTL_ELEVATE", "sudo"),
            ("MSI_CTL_NOTIFY", " "),
        ]))
        .unwrap();
        assert_eq!(config.sysfs_dir, PathBuf::from("/tmp/fake-ec"));
        assert_eq!(config.elevate_helper, "sudo");
        assert_eq!(config.notify_helper, DEFAULT_NOTIFY);
    }

    #[test]
    fn test_config_requires_home() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }
}
