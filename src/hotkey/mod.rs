//! Hotkey module for global keyboard shortcuts
//!
//! Binds portable key sequences to native X11 key grabs and routes the
//! grabbed key presses back to per-action listeners.

mod interceptor;
mod keys;
mod platform;
mod registry;
mod x11;

pub use interceptor::ShortcutContext;
pub use keys::{KeySequence, LogicalKey, Modifiers};
pub use platform::{KeyGrabPlatform, NativeEvent, UnsupportedPlatform};
pub use registry::GlobalShortcut;
pub use x11::X11Platform;

#[cfg(test)]
pub(crate) use keys::masks;
#[cfg(test)]
pub(crate) use platform::fake;
