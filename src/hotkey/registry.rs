//! Per-action global shortcut
//!
//! A `GlobalShortcut` turns a portable `KeySequence` into a native grab and
//! exposes a single activation signal. Failures never surface to the
//! caller: an unsupported session, an untranslatable key or a grab the
//! display server refuses all leave the shortcut stored but inactive.

use std::rc::Rc;

use tracing::{debug, info, warn};

use super::interceptor::{Listener, ListenerId, ShortcutBinding, ShortcutContext};
use super::keys::KeySequence;

/// Native (keycode, mask) pair this shortcut currently holds a grab for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NativeGrab {
    keycode: u32,
    modifier_mask: u32,
}

/// One bindable action's global shortcut
pub struct GlobalShortcut {
    context: Rc<ShortcutContext>,
    listener: Rc<Listener>,
    sequence: KeySequence,
    supported: bool,
    grab: Option<NativeGrab>,
}

impl GlobalShortcut {
    /// Create an unbound shortcut
    pub fn new(context: &Rc<ShortcutContext>) -> Self {
        Self {
            context: Rc::clone(context),
            listener: context.new_listener(),
            sequence: KeySequence::empty(),
            supported: context.is_supported(),
            grab: None,
        }
    }

    /// Whether global grabbing works in this session
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// The configured sequence, registered or not
    pub fn shortcut(&self) -> KeySequence {
        self.sequence
    }

    /// Whether a native grab is currently held
    pub fn is_registered(&self) -> bool {
        self.grab.is_some()
    }

    pub fn id(&self) -> ListenerId {
        self.listener.id()
    }

    /// Register a handler fired once per matching key press
    pub fn connect_activated<F>(&self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.listener.connect(Box::new(handler));
    }

    /// Replace the configured sequence
    ///
    /// The previous grab is always released first; an empty sequence
    /// leaves the shortcut unbound.
    pub fn set_shortcut(&mut self, sequence: KeySequence) {
        self.unregister();
        self.sequence = sequence;
        if !self.sequence.is_empty() && self.supported {
            if self.register() {
                info!(id = %self.id(), sequence = %self.sequence, "global shortcut registered");
            } else {
                debug!(id = %self.id(), sequence = %self.sequence, "global shortcut inactive");
            }
        }
    }

    fn register(&mut self) -> bool {
        let Some(key) = self.sequence.key() else {
            return false;
        };

        let platform = self.context.platform();
        let Some(keycode) = platform.keysym_to_keycode(key.keysym()) else {
            debug!(%key, keysym = key.keysym(), "no native key code for key");
            return false;
        };
        let modifier_mask = self.sequence.modifiers().to_native_mask();

        if !self.context.claim_grab(keycode, modifier_mask) {
            warn!(keycode, modifier_mask, "key already grabbed by another shortcut");
            return false;
        }
        if let Err(e) = platform.grab(keycode, modifier_mask) {
            warn!(?e, keycode, modifier_mask, "key grab refused");
            self.context.release_grab(keycode, modifier_mask);
            return false;
        }

        self.context
            .ensure_instance()
            .add_binding(ShortcutBinding::new(keycode, modifier_mask, &self.listener));
        self.grab = Some(NativeGrab {
            keycode,
            modifier_mask,
        });
        true
    }

    fn unregister(&mut self) {
        let Some(grab) = self.grab.take() else {
            return;
        };

        if let Some(interceptor) = self.context.instance() {
            interceptor.remove_bindings(self.listener.id());
        }
        if let Err(e) = self
            .context
            .platform()
            .ungrab(grab.keycode, grab.modifier_mask)
        {
            warn!(?e, keycode = grab.keycode, "key ungrab failed");
        }
        self.context.release_grab(grab.keycode, grab.modifier_mask);
        debug!(id = %self.id(), sequence = %self.sequence, "global shortcut released");
    }
}

impl Drop for GlobalShortcut {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::hotkey::keys::masks;
    use crate::hotkey::platform::fake::{Call, FakePlatform};
    use crate::hotkey::platform::NativeEvent;

    fn setup(platform: FakePlatform) -> (Rc<FakePlatform>, Rc<ShortcutContext>) {
        let platform = Rc::new(platform);
        let ctx = ShortcutContext::new(platform.clone());
        (platform, ctx)
    }

    fn counted(ctx: &Rc<ShortcutContext>) -> (GlobalShortcut, Rc<Cell<u32>>) {
        let shortcut = GlobalShortcut::new(ctx);
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        shortcut.connect_activated(move || counter.set(counter.get() + 1));
        (shortcut, count)
    }

    fn seq(text: &str) -> KeySequence {
        text.parse().unwrap()
    }

    fn press(keycode: u32, state: u32) -> NativeEvent {
        NativeEvent::KeyPress { keycode, state }
    }

    #[test]
    fn test_ctrl_1_fires_once() {
        let (platform, ctx) = setup(FakePlatform::new());
        let (mut eco, count) = counted(&ctx);

        eco.set_shortcut(seq("Ctrl+1"));
        assert!(eco.is_registered());
        assert_eq!(platform.grab_calls(), vec![Call::Grab(10, masks::CONTROL)]);

        assert!(ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_empty_sequence_unbinds() {
        let (platform, ctx) = setup(FakePlatform::new());
        let (mut shortcut, count) = counted(&ctx);

        shortcut.set_shortcut(seq("Ctrl+1"));
        shortcut.set_shortcut(KeySequence::empty());

        assert!(!shortcut.is_registered());
        assert!(!platform.is_grabbed(10, masks::CONTROL));
        assert!(!ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_rebind_keeps_single_binding() {
        let (_platform, ctx) = setup(FakePlatform::new());
        let (mut shortcut, count) = counted(&ctx);

        shortcut.set_shortcut(seq("Ctrl+1"));
        shortcut.set_shortcut(seq("Ctrl+2"));

        let bindings = ctx.instance().unwrap().bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].keycode, 11);

        assert!(!ctx.dispatch(&press(10, masks::CONTROL)));
        assert!(ctx.dispatch(&press(11, masks::CONTROL)));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_same_sequence_twice_is_idempotent() {
        let (platform, ctx) = setup(FakePlatform::new());
        let (mut shortcut, count) = counted(&ctx);

        shortcut.set_shortcut(seq("Ctrl+1"));
        shortcut.set_shortcut(seq("Ctrl+1"));

        assert_eq!(
            platform.grab_calls(),
            vec![
                Call::Grab(10, masks::CONTROL),
                Call::Ungrab(10, masks::CONTROL),
                Call::Grab(10, masks::CONTROL),
            ]
        );
        assert!(ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_first_grab_wins_and_loser_stays_usable() {
        let (platform, ctx) = setup(FakePlatform::new());
        let (mut first, first_count) = counted(&ctx);
        let (mut second, second_count) = counted(&ctx);

        first.set_shortcut(seq("Ctrl+1"));
        second.set_shortcut(seq("Ctrl+1"));
        assert!(first.is_registered());
        assert!(!second.is_registered());

        assert!(ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(first_count.get(), 1);
        assert_eq!(second_count.get(), 0);

        // The loser never ungrabs the winner's key
        second.set_shortcut(seq("Ctrl+2"));
        assert!(platform.is_grabbed(10, masks::CONTROL));
        assert!(second.is_registered());
        assert!(ctx.dispatch(&press(11, masks::CONTROL)));
        assert_eq!(second_count.get(), 1);
    }

    #[test]
    fn test_shared_sequence_keeps_first_grab_after_rebind() {
        let (platform, ctx) = setup(FakePlatform::new());
        let (mut eco, eco_count) = counted(&ctx);
        let (mut turbo, _) = counted(&ctx);

        eco.set_shortcut(seq("Ctrl+1"));
        turbo.set_shortcut(seq("Ctrl+1"));
        assert!(!turbo.is_registered());
        assert_eq!(platform.grab_calls(), vec![Call::Grab(10, masks::CONTROL)]);

        turbo.set_shortcut(seq("Ctrl+3"));
        assert!(eco.is_registered());
        assert!(platform.is_grabbed(10, masks::CONTROL));
        assert!(ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(eco_count.get(), 1);

        // Once released, the combination is free for another shortcut
        drop(eco);
        turbo.set_shortcut(seq("Ctrl+1"));
        assert!(turbo.is_registered());
        assert!(platform.is_grabbed(10, masks::CONTROL));
    }

    #[test]
    fn test_grab_held_by_other_client_is_refused() {
        let (platform, ctx) = setup(FakePlatform::new());
        platform.hold_foreign_grab(11, masks::CONTROL);
        let (mut comfort, count) = counted(&ctx);

        comfort.set_shortcut(seq("Ctrl+2"));
        assert!(!comfort.is_registered());
        assert!(!ctx.dispatch(&press(11, masks::CONTROL)));
        assert_eq!(count.get(), 0);

        // Nothing was ours to release
        comfort.set_shortcut(KeySequence::empty());
        assert!(!platform.grab_calls().contains(&Call::Ungrab(11, masks::CONTROL)));

        // The refused pair was not left reserved
        platform.release_foreign_grab(11, masks::CONTROL);
        comfort.set_shortcut(seq("Ctrl+2"));
        assert!(comfort.is_registered());
    }

    #[test]
    fn test_untranslatable_key_stores_sequence_only() {
        let (platform, ctx) = setup(FakePlatform::new());
        let (mut shortcut, _) = counted(&ctx);

        shortcut.set_shortcut(seq("Ctrl+F12"));
        assert_eq!(shortcut.shortcut(), seq("Ctrl+F12"));
        assert!(!shortcut.is_registered());
        assert!(platform.grab_calls().is_empty());
    }

    #[test]
    fn test_drop_releases_grab() {
        let (platform, ctx) = setup(FakePlatform::new());
        {
            let (mut shortcut, _) = counted(&ctx);
            shortcut.set_shortcut(seq("Ctrl+Shift+A"));
            assert!(platform.is_grabbed(38, masks::CONTROL | masks::SHIFT));
        }
        assert!(!platform.is_grabbed(38, masks::CONTROL | masks::SHIFT));
        assert!(ctx.instance().unwrap().is_empty());
    }

    #[test]
    fn test_drop_unbound_does_nothing() {
        let (platform, ctx) = setup(FakePlatform::new());
        drop(GlobalShortcut::new(&ctx));
        assert!(platform.calls.borrow().is_empty());
        assert!(ctx.instance().is_none());
    }

    #[test]
    fn test_unsupported_session_never_grabs() {
        let (platform, ctx) = setup(FakePlatform::unsupported());
        let (mut shortcut, count) = counted(&ctx);
        assert!(!shortcut.is_supported());

        shortcut.set_shortcut(seq("Ctrl+1"));
        assert_eq!(shortcut.shortcut(), seq("Ctrl+1"));
        assert!(!ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(count.get(), 0);

        drop(shortcut);
        assert!(platform.calls.borrow().is_empty());
    }

    #[test]
    fn test_handler_may_rebind_during_dispatch() {
        let (_platform, ctx) = setup(FakePlatform::new());
        let shortcut = Rc::new(std::cell::RefCell::new(GlobalShortcut::new(&ctx)));
        let weak = Rc::downgrade(&shortcut);
        shortcut.borrow().connect_activated(move || {
            if let Some(shortcut) = weak.upgrade() {
                if let Ok(mut shortcut) = shortcut.try_borrow_mut() {
                    shortcut.set_shortcut("Ctrl+2".parse().unwrap());
                }
            }
        });
        shortcut.borrow_mut().set_shortcut(seq("Ctrl+1"));

        assert!(ctx.dispatch(&press(10, masks::CONTROL)));
        assert_eq!(shortcut.borrow().shortcut(), seq("Ctrl+2"));
        assert!(!ctx.dispatch(&press(10, masks::CONTROL)));
    }
}
