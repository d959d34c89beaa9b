//! Key sequence definitions and native translation
//!
//! Provides the portable `KeySequence` representation ("Ctrl+1") used by
//! front ends and the persisted shortcut file, plus the translation of its
//! parts into X11 keysyms and modifier masks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Modifier bits from the X11 core protocol key/button state
pub mod masks {
    /// Shift key modifier bit
    pub const SHIFT: u32 = 1 << 0;
    /// Caps Lock modifier bit
    pub const LOCK: u32 = 1 << 1;
    /// Control key modifier bit
    pub const CONTROL: u32 = 1 << 2;
    /// Mod1 (Alt) modifier bit
    pub const MOD1: u32 = 1 << 3;
    /// Mod2 (usually Num Lock) modifier bit
    pub const MOD2: u32 = 1 << 4;
    /// Mod4 (Super/Meta) modifier bit
    pub const MOD4: u32 = 1 << 6;
}

/// Errors produced while parsing a textual key sequence
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeySequenceError {
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),

    #[error("unknown key '{0}'")]
    UnknownKey(String),

    #[error("key sequence '{0}' has no primary key")]
    MissingKey(String),
}

/// Modifier keys required by a key sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    /// Super / Windows / Meta key
    pub meta: bool,
}

impl Modifiers {
    pub const CONTROL: Self = Self {
        shift: false,
        control: true,
        alt: false,
        meta: false,
    };

    /// Check if no modifier is required
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.control && !self.alt && !self.meta
    }

    /// Translate to the X11 modifier mask used for grabs
    pub fn to_native_mask(&self) -> u32 {
        let mut mask = 0;
        if self.shift {
            mask |= masks::SHIFT;
        }
        if self.control {
            mask |= masks::CONTROL;
        }
        if self.alt {
            mask |= masks::MOD1;
        }
        if self.meta {
            mask |= masks::MOD4;
        }
        mask
    }

    fn apply(&mut self, token: &str) -> Result<(), KeySequenceError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" => self.control = true,
            "shift" => self.shift = true,
            "alt" | "option" => self.alt = true,
            "meta" | "super" | "win" | "cmd" => self.meta = true,
            _ => return Err(KeySequenceError::UnknownModifier(token.trim().to_string())),
        }
        Ok(())
    }
}

/// Named non-character keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
    Tab,
    Backspace,
    Return,
    Space,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Up,
    Right,
    Down,
    Print,
    Pause,
}

impl NamedKey {
    const ALL: [NamedKey; 17] = [
        NamedKey::Escape,
        NamedKey::Tab,
        NamedKey::Backspace,
        NamedKey::Return,
        NamedKey::Space,
        NamedKey::Insert,
        NamedKey::Delete,
        NamedKey::Home,
        NamedKey::End,
        NamedKey::PageUp,
        NamedKey::PageDown,
        NamedKey::Left,
        NamedKey::Up,
        NamedKey::Right,
        NamedKey::Down,
        NamedKey::Print,
        NamedKey::Pause,
    ];

    fn name(self) -> &'static str {
        match self {
            NamedKey::Escape => "Esc",
            NamedKey::Tab => "Tab",
            NamedKey::Backspace => "Backspace",
            NamedKey::Return => "Return",
            NamedKey::Space => "Space",
            NamedKey::Insert => "Ins",
            NamedKey::Delete => "Del",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::PageUp => "PgUp",
            NamedKey::PageDown => "PgDown",
            NamedKey::Left => "Left",
            NamedKey::Up => "Up",
            NamedKey::Right => "Right",
            NamedKey::Down => "Down",
            NamedKey::Print => "Print",
            NamedKey::Pause => "Pause",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        let alias = match lower.as_str() {
            "escape" => Some(NamedKey::Escape),
            "enter" => Some(NamedKey::Return),
            "insert" => Some(NamedKey::Insert),
            "delete" => Some(NamedKey::Delete),
            "pageup" | "prior" => Some(NamedKey::PageUp),
            "pagedown" | "next" => Some(NamedKey::PageDown),
            _ => None,
        };
        alias.or_else(|| {
            Self::ALL
                .into_iter()
                .find(|key| key.name().eq_ignore_ascii_case(&lower))
        })
    }

    fn keysym(self) -> u32 {
        match self {
            NamedKey::Escape => 0xff1b,
            NamedKey::Tab => 0xff09,
            NamedKey::Backspace => 0xff08,
            NamedKey::Return => 0xff0d,
            NamedKey::Space => 0x0020,
            NamedKey::Insert => 0xff63,
            NamedKey::Delete => 0xffff,
            NamedKey::Home => 0xff50,
            NamedKey::End => 0xff57,
            NamedKey::PageUp => 0xff55,
            NamedKey::PageDown => 0xff56,
            NamedKey::Left => 0xff51,
            NamedKey::Up => 0xff52,
            NamedKey::Right => 0xff53,
            NamedKey::Down => 0xff54,
            NamedKey::Print => 0xff61,
            NamedKey::Pause => 0xff13,
        }
    }
}

/// Layout-independent identifier of the primary key in a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    /// Printable ASCII character, stored lowercase
    Char(char),
    /// Function key F1..=F35
    Function(u8),
    Named(NamedKey),
}

impl LogicalKey {
    /// X11 keysym for this key
    pub fn keysym(&self) -> u32 {
        match self {
            LogicalKey::Char(c) => *c as u32,
            // XK_F1 is 0xffbe, the rest follow contiguously
            LogicalKey::Function(n) => 0xffbe + u32::from(*n) - 1,
            LogicalKey::Named(named) => named.keysym(),
        }
    }

    fn parse(token: &str) -> Result<Self, KeySequenceError> {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_graphic() {
                return Ok(LogicalKey::Char(c.to_ascii_lowercase()));
            }
        }

        if let Some(number) = token
            .strip_prefix('F')
            .or_else(|| token.strip_prefix('f'))
            .and_then(|n| n.parse::<u8>().ok())
        {
            if (1..=35).contains(&number) {
                return Ok(LogicalKey::Function(number));
            }
        }

        NamedKey::parse(token)
            .map(LogicalKey::Named)
            .ok_or_else(|| KeySequenceError::UnknownKey(token.to_string()))
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalKey::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            LogicalKey::Function(n) => write!(f, "F{}", n),
            LogicalKey::Named(named) => f.write_str(named.name()),
        }
    }
}

/// A single key combination: primary key plus required modifiers
///
/// An empty sequence (no primary key) means "unbound".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeySequence {
    key: Option<LogicalKey>,
    modifiers: Modifiers,
}

impl KeySequence {
    pub fn new(key: LogicalKey, modifiers: Modifiers) -> Self {
        Self {
            key: Some(key),
            modifiers,
        }
    }

    /// The unbound sequence
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_none()
    }

    pub fn key(&self) -> Option<LogicalKey> {
        self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

impl FromStr for KeySequence {
    type Err = KeySequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::empty());
        }

        // "Ctrl++" binds the plus key itself
        let (modifier_part, key_part) = match s.strip_suffix("++") {
            Some(rest) => (rest, "+"),
            None if s == "+" => ("", "+"),
            None => s.rsplit_once('+').unwrap_or(("", s)),
        };

        let key_part = key_part.trim();
        if key_part.is_empty() {
            return Err(KeySequenceError::MissingKey(s.to_string()));
        }

        let mut modifiers = Modifiers::default();
        if !modifier_part.is_empty() {
            for token in modifier_part.split('+') {
                modifiers.apply(token)?;
            }
        }

        Ok(Self::new(LogicalKey::parse(key_part)?, modifiers))
    }
}

impl TryFrom<String> for KeySequence {
    type Error = KeySequenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeySequence> for String {
    fn from(sequence: KeySequence) -> Self {
        sequence.to_string()
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(key) = self.key else {
            return Ok(());
        };
        if self.modifiers.control {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.meta {
            f.write_str("Meta+")?;
        }
        write!(f, "{}", key)
    }
}
