//! X11 key grab backend
//!
//! Grabs are taken on the root window so they fire regardless of focus.
//! Raw events are read on a dedicated thread (started on the first
//! registration) and handed to the event loop over a channel, keeping the
//! binding table itself on the event-loop thread.

use std::cell::Cell;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, GrabMode, ModMask, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::keys::masks;
use super::platform::{KeyGrabPlatform, NativeEvent, PlatformError};

/// Masks a grab is repeated under so Caps Lock and Num Lock do not block it
fn lock_variants(modifiers: u32) -> [u32; 4] {
    [
        modifiers,
        modifiers | masks::LOCK,
        modifiers | masks::MOD2,
        modifiers | masks::LOCK | masks::MOD2,
    ]
}

fn native_keycode(keycode: u32) -> Result<u8, PlatformError> {
    u8::try_from(keycode)
        .map_err(|_| PlatformError::Unsupported(format!("keycode {keycode} out of range")))
}

/// Kind of graphical session we are running in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    X11,
    Wayland,
    Unknown,
}

impl SessionKind {
    /// Detect the session type from the environment
    pub fn detect() -> Self {
        Self::from_env(
            std::env::var("XDG_SESSION_TYPE").ok().as_deref(),
            std::env::var_os("WAYLAND_DISPLAY").is_some(),
            std::env::var_os("DISPLAY").is_some(),
        )
    }

    fn from_env(session_type: Option<&str>, wayland_display: bool, x_display: bool) -> Self {
        match session_type.map(str::to_ascii_lowercase).as_deref() {
            Some("wayland") => SessionKind::Wayland,
            Some("x11") if x_display => SessionKind::X11,
            _ if wayland_display => SessionKind::Wayland,
            _ if x_display => SessionKind::X11,
            _ => SessionKind::Unknown,
        }
    }
}

/// Global key grabs over an X11 display connection
pub struct X11Platform {
    conn: Arc<RustConnection>,
    root: Window,
    events_tx: mpsc::UnboundedSender<NativeEvent>,
    pump_started: Cell<bool>,
}

impl X11Platform {
    /// Connect to `$DISPLAY`
    ///
    /// Raw events show up on `events_tx` once the event hook is installed.
    pub fn connect(events_tx: mpsc::UnboundedSender<NativeEvent>) -> Result<Self, PlatformError> {
        match SessionKind::detect() {
            SessionKind::X11 => {}
            SessionKind::Wayland => {
                return Err(PlatformError::Unsupported(
                    "wayland sessions only deliver keys to the focused client".to_string(),
                ))
            }
            SessionKind::Unknown => {
                return Err(PlatformError::Unsupported(
                    "no graphical session detected".to_string(),
                ))
            }
        }

        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn.setup().roots[screen_num].root;
        info!(screen = screen_num, root, "connected to X11 display");

        Ok(Self {
            conn: Arc::new(conn),
            root,
            events_tx,
            pump_started: Cell::new(false),
        })
    }

    fn translate(event: Event) -> NativeEvent {
        match event {
            Event::KeyPress(press) => NativeEvent::KeyPress {
                keycode: u32::from(press.detail),
                state: u32::from(u16::from(press.state)),
            },
            Event::KeyRelease(release) => NativeEvent::KeyRelease {
                keycode: u32::from(release.detail),
                state: u32::from(u16::from(release.state)),
            },
            _ => NativeEvent::Other,
        }
    }

    fn ungrab_one(&self, keycode: u8, mask: u32) -> Result<(), PlatformError> {
        self.conn
            .ungrab_key(keycode, self.root, ModMask::from(mask as u16))?
            .check()?;
        Ok(())
    }
}

impl KeyGrabPlatform for X11Platform {
    fn session_supported(&self) -> bool {
        true
    }

    fn install_event_hook(&self) -> Result<(), PlatformError> {
        if self.pump_started.replace(true) {
            return Ok(());
        }

        let conn = Arc::clone(&self.conn);
        let events_tx = self.events_tx.clone();

        thread::Builder::new()
            .name("x11-event-pump".to_string())
            .spawn(move || {
                info!("x11 event pump started");
                loop {
                    match conn.wait_for_event() {
                        Ok(event) => {
                            if events_tx.send(Self::translate(event)).is_err() {
                                debug!("event loop gone, stopping pump");
                                break;
                            }
                        }
                        Err(e) => {
                            error!(?e, "x11 connection lost");
                            break;
                        }
                    }
                }
                info!("x11 event pump stopped");
            })
            .map_err(|e| PlatformError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    fn keysym_to_keycode(&self, keysym: u32) -> Option<u32> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);

        let reply = match self
            .conn
            .get_keyboard_mapping(min, max - min + 1)
            .map_err(PlatformError::from)
            .and_then(|cookie| cookie.reply().map_err(PlatformError::from))
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(?e, "failed to read keyboard mapping");
                return None;
            }
        };

        let per_keycode = usize::from(reply.keysyms_per_keycode);
        if per_keycode == 0 {
            return None;
        }

        reply
            .keysyms
            .chunks(per_keycode)
            .position(|syms| syms.contains(&keysym))
            .map(|index| u32::from(min) + index as u32)
    }

    fn grab(&self, keycode: u32, modifiers: u32) -> Result<(), PlatformError> {
        let native = native_keycode(keycode)?;
        for (taken, mask) in lock_variants(modifiers).into_iter().enumerate() {
            let result = self
                .conn
                .grab_key(
                    true,
                    self.root,
                    ModMask::from(mask as u16),
                    native,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )
                .map_err(PlatformError::from)
                .and_then(|cookie| cookie.check().map_err(PlatformError::from));
            if let Err(e) = result {
                // All or nothing: drop the variants grabbed so far
                for mask in &lock_variants(modifiers)[..taken] {
                    if let Err(e) = self.ungrab_one(native, *mask) {
                        debug!(?e, keycode, mask, "rollback ungrab failed");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn ungrab(&self, keycode: u32, modifiers: u32) -> Result<(), PlatformError> {
        let native = native_keycode(keycode)?;
        let mut first_error = None;
        for mask in lock_variants(modifiers) {
            if let Err(e) = self.ungrab_one(native, mask) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_detection() {
        assert_eq!(
            SessionKind::from_env(Some("x11"), false, true),
            SessionKind::X11
        );
        assert_eq!(
            SessionKind::from_env(Some("Wayland"), true, true),
            SessionKind::Wayland
        );
        assert_eq!(SessionKind::from_env(None, true, true), SessionKind::Wayland);
        assert_eq!(SessionKind::from_env(Some("tty"), false, true), SessionKind::X11);
        assert_eq!(SessionKind::from_env(None, false, false), SessionKind::Unknown);
    }

    #[test]
    fn test_lock_variants_cover_caps_and_num_lock() {
        let variants = lock_variants(masks::CONTROL);
        assert_eq!(variants[0], masks::CONTROL);
        assert!(variants.contains(&(masks::CONTROL | masks::LOCK)));
        assert!(variants.contains(&(masks::CONTROL | masks::MOD2)));
        assert!(variants.contains(&(masks::CONTROL | masks::LOCK | masks::MOD2)));
    }

    #[test]
    fn test_keycode_out_of_range_is_rejected() {
        assert_eq!(native_keycode(10).ok(), Some(10));
        assert!(matches!(
            native_keycode(300),
            Err(PlatformError::Unsupported(_))
        ));
    }
}
