//! Platform seam for global key grabbing
//!
//! The shortcut core only talks to the windowing system through
//! `KeyGrabPlatform`, so the X11 backend and the no-op backend used on
//! unsupported sessions are interchangeable.

/// Raw input event as delivered by the platform's event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEvent {
    /// A key went down
    KeyPress {
        /// Native (layout dependent) key code
        keycode: u32,
        /// Native modifier state at the time of the press
        state: u32,
    },
    /// A key went up
    KeyRelease { keycode: u32, state: u32 },
    /// Any other protocol event
    Other,
}

/// Errors reported by a platform backend
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("global key grabbing is not available in this session: {0}")]
    Unsupported(String),

    #[error("failed to connect to the display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("display connection error: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("request rejected by the display server: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("failed to spawn event pump thread: {0}")]
    ThreadSpawn(String),
}

/// Native key grab primitives
pub trait KeyGrabPlatform {
    /// Whether the active session exposes key events of other clients
    fn session_supported(&self) -> bool;

    /// Hook the raw event stream into the application's event loop
    ///
    /// Called exactly once, when the interceptor is first created.
    fn install_event_hook(&self) -> Result<(), PlatformError>;

    /// Translate a keysym into the keyboard's native key code
    fn keysym_to_keycode(&self, keysym: u32) -> Option<u32>;

    /// Grab `keycode` with `modifiers` on the global scope
    ///
    /// Lock keys (Caps Lock, Num Lock) must not prevent the grab from firing.
    fn grab(&self, keycode: u32, modifiers: u32) -> Result<(), PlatformError>;

    /// Release a grab previously taken with `grab`
    fn ungrab(&self, keycode: u32, modifiers: u32) -> Result<(), PlatformError>;
}

/// Backend for sessions where global grabs are impossible
#[derive(Debug, Clone)]
pub struct UnsupportedPlatform {
    reason: String,
}

impl UnsupportedPlatform {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl KeyGrabPlatform for UnsupportedPlatform {
    fn session_supported(&self) -> bool {
        false
    }

    fn install_event_hook(&self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported(self.reason.clone()))
    }

    fn keysym_to_keycode(&self, _keysym: u32) -> Option<u32> {
        None
    }

    fn grab(&self, _keycode: u32, _modifiers: u32) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported(self.reason.clone()))
    }

    fn ungrab(&self, _keycode: u32, _modifiers: u32) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported(self.reason.clone()))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording platform used by the shortcut tests

    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Call {
        InstallHook,
        Grab(u32, u32),
        Ungrab(u32, u32),
    }

    /// Platform with a US-style keymap for digits and letters
    ///
    /// Behaves like a single X11 client: grabbing a pair it already holds
    /// succeeds again, while pairs held by another client are refused.
    pub struct FakePlatform {
        pub supported: bool,
        pub keymap: HashMap<u32, u32>,
        pub calls: RefCell<Vec<Call>>,
        grabs: RefCell<HashSet<(u32, u32)>>,
        foreign: RefCell<HashSet<(u32, u32)>>,
        pub hooks_installed: Cell<usize>,
    }

    impl FakePlatform {
        pub fn new() -> Self {
            let mut keymap = HashMap::new();
            // '1'..'9' -> 10..18, '0' -> 19 as on a standard PC keymap
            for (offset, digit) in ('1'..='9').enumerate() {
                keymap.insert(digit as u32, 10 + offset as u32);
            }
            keymap.insert('0' as u32, 19);
            keymap.insert('q' as u32, 24);
            keymap.insert('a' as u32, 38);
            keymap.insert(0xffbe, 67);
            Self {
                supported: true,
                keymap,
                calls: RefCell::new(Vec::new()),
                grabs: RefCell::new(HashSet::new()),
                foreign: RefCell::new(HashSet::new()),
                hooks_installed: Cell::new(0),
            }
        }

        pub fn unsupported() -> Self {
            Self {
                supported: false,
                ..Self::new()
            }
        }

        pub fn grab_calls(&self) -> Vec<Call> {
            self.calls
                .borrow()
                .iter()
                .copied()
                .filter(|call| !matches!(call, Call::InstallHook))
                .collect()
        }

        pub fn is_grabbed(&self, keycode: u32, modifiers: u32) -> bool {
            self.grabs.borrow().contains(&(keycode, modifiers))
        }

        /// Pretend another client holds this pair
        pub fn hold_foreign_grab(&self, keycode: u32, modifiers: u32) {
            self.foreign.borrow_mut().insert((keycode, modifiers));
        }

        pub fn release_foreign_grab(&self, keycode: u32, modifiers: u32) {
            self.foreign.borrow_mut().remove(&(keycode, modifiers));
        }
    }

    impl KeyGrabPlatform for FakePlatform {
        fn session_supported(&self) -> bool {
            self.supported
        }

        fn install_event_hook(&self) -> Result<(), PlatformError> {
            self.calls.borrow_mut().push(Call::InstallHook);
            self.hooks_installed.set(self.hooks_installed.get() + 1);
            Ok(())
        }

        fn keysym_to_keycode(&self, keysym: u32) -> Option<u32> {
            self.keymap.get(&keysym).copied()
        }

        fn grab(&self, keycode: u32, modifiers: u32) -> Result<(), PlatformError> {
            self.calls.borrow_mut().push(Call::Grab(keycode, modifiers));
            if self.foreign.borrow().contains(&(keycode, modifiers)) {
                return Err(PlatformError::Unsupported("BadAccess".to_string()));
            }
            self.grabs.borrow_mut().insert((keycode, modifiers));
            Ok(())
        }

        fn ungrab(&self, keycode: u32, modifiers: u32) -> Result<(), PlatformError> {
            self.calls.borrow_mut().push(Call::Ungrab(keycode, modifiers));
            self.grabs.borrow_mut().remove(&(keycode, modifiers));
            Ok(())
        }
    }
}
