//! Performance scenarios understood by the msi-ec driver

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hotkey::{KeySequence, LogicalKey, Modifiers};

/// User scenario written to the `shift_mode` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Eco,
    Comfort,
    Turbo,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Eco, Scenario::Comfort, Scenario::Turbo];

    /// Value written to the driver
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Eco => "eco",
            Scenario::Comfort => "comfort",
            Scenario::Turbo => "turbo",
        }
    }

    /// Ctrl+1, Ctrl+2, Ctrl+3
    pub fn default_shortcut(&self) -> KeySequence {
        let digit = match self {
            Scenario::Eco => '1',
            Scenario::Comfort => '2',
            Scenario::Turbo => '3',
        };
        KeySequence::new(LogicalKey::Char(digit), Modifiers::CONTROL)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shortcuts() {
        assert_eq!(Scenario::Eco.default_shortcut().to_string(), "Ctrl+1");
        assert_eq!(Scenario::Turbo.default_shortcut().to_string(), "Ctrl+3");
    }

    #[test]
    fn test_driver_values() {
        let values: Vec<&str> = Scenario::ALL.iter().map(Scenario::as_str).collect();
        assert_eq!(values, ["eco", "comfort", "turbo"]);
        assert_eq!(Scenario::Comfort.to_string(), "comfort");
    }
}
