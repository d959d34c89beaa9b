//! Persisted per-scenario shortcut overrides

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::hotkey::KeySequence;

use super::scenario::Scenario;

/// Scenario -> key sequence, as stored on disk
pub type ShortcutMap = BTreeMap<Scenario, KeySequence>;

/// Built-in shortcuts for every scenario
pub fn default_shortcuts() -> ShortcutMap {
    Scenario::ALL
        .into_iter()
        .map(|scenario| (scenario, scenario.default_shortcut()))
        .collect()
}

/// Load saved shortcuts merged over the defaults
///
/// A missing file yields the defaults; a corrupt one is an error.
pub fn load_shortcuts(path: &Path) -> Result<ShortcutMap> {
    let mut shortcuts = default_shortcuts();
    if !path.exists() {
        debug!(?path, "no saved shortcuts, using defaults");
        return Ok(shortcuts);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let saved: ShortcutMap = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    shortcuts.extend(saved);
    Ok(shortcuts)
}

/// Write the shortcut map as pretty JSON
pub fn save_shortcuts(path: &Path, shortcuts: &ShortcutMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(shortcuts)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("msi-ctl-store-{}-{}", name, std::process::id()))
            .join("shortcuts.json")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let shortcuts = load_shortcuts(&scratch_file("missing")).unwrap();
        assert_eq!(shortcuts, default_shortcuts());
    }

    #[test]
    fn test_saved_overrides_merge_with_defaults() {
        let path = scratch_file("merge");
        let mut shortcuts = default_shortcuts();
        shortcuts.insert(Scenario::Turbo, "Meta+T".parse().unwrap());
        shortcuts.insert(Scenario::Eco, KeySequence::empty());
        save_shortcuts(&path, &shortcuts).unwrap();

        let loaded = load_shortcuts(&path).unwrap();
        assert_eq!(loaded, shortcuts);
        assert_eq!(loaded[&Scenario::Comfort].to_string(), "Ctrl+2");

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = scratch_file("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"eco": "Hyper+1"}"#).unwrap();

        assert!(load_shortcuts(&path).is_err());

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
