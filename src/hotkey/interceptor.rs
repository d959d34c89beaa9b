//! Native event interception and dispatch
//!
//! `ShortcutContext` is the process-scoped handle every `GlobalShortcut`
//! is created from. It owns the lazily created `Interceptor`, which holds
//! the binding table and decides, for each raw event coming out of the
//! platform's event stream, whether a shortcut consumes it.
//!
//! Everything here lives on the event-loop thread; the table is guarded by
//! a `RefCell` only to survive listeners that rebind while being notified.

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, info, trace};

use super::platform::{KeyGrabPlatform, NativeEvent};

/// Identity of one `GlobalShortcut` in the binding table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Activation target shared between a shortcut and its table entries
pub(crate) struct Listener {
    id: ListenerId,
    handlers: RefCell<Vec<Box<dyn FnMut()>>>,
}

impl Listener {
    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn connect(&self, handler: Box<dyn FnMut()>) {
        self.handlers.borrow_mut().push(handler);
    }

    /// Run every handler once
    ///
    /// The handlers are taken out for the duration of the call, so one may
    /// connect more handlers or dispatch again without hitting the borrow.
    /// Handlers connected meanwhile are kept after the running ones.
    fn activate(&self) {
        let mut running = std::mem::take(&mut *self.handlers.borrow_mut());
        for handler in running.iter_mut() {
            handler();
        }
        let mut handlers = self.handlers.borrow_mut();
        running.append(&mut handlers);
        *handlers = running;
    }
}

/// One entry of the interceptor's table
#[derive(Clone)]
pub struct ShortcutBinding {
    pub keycode: u32,
    pub modifier_mask: u32,
    listener_id: ListenerId,
    listener: Weak<Listener>,
}

impl ShortcutBinding {
    pub(crate) fn new(keycode: u32, modifier_mask: u32, listener: &Rc<Listener>) -> Self {
        Self {
            keycode,
            modifier_mask,
            listener_id: listener.id(),
            listener: Rc::downgrade(listener),
        }
    }

    /// Required modifiers must be a subset of the pressed ones
    fn matches(&self, keycode: u32, state: u32) -> bool {
        self.keycode == keycode && state & self.modifier_mask == self.modifier_mask
    }
}

impl fmt::Debug for ShortcutBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutBinding")
            .field("keycode", &self.keycode)
            .field("modifier_mask", &format_args!("{:#06x}", self.modifier_mask))
            .field("listener", &self.listener_id)
            .finish()
    }
}

/// Binding table plus the raw event filter
#[derive(Debug, Default)]
pub struct Interceptor {
    bindings: RefCell<Vec<ShortcutBinding>>,
}

impl Interceptor {
    /// Add a binding, replacing any entry already owned by the same listener
    pub fn add_binding(&self, binding: ShortcutBinding) {
        let mut bindings = self.bindings.borrow_mut();
        bindings.retain(|entry| entry.listener_id != binding.listener_id);
        debug!(?binding, "binding added");
        bindings.push(binding);
    }

    /// Remove every binding owned by `listener`, returning how many were dropped
    pub fn remove_bindings(&self, listener: ListenerId) -> usize {
        let mut bindings = self.bindings.borrow_mut();
        let before = bindings.len();
        bindings.retain(|entry| entry.listener_id != listener);
        before - bindings.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }

    #[cfg(test)]
    pub fn bindings(&self) -> Vec<ShortcutBinding> {
        self.bindings.borrow().clone()
    }

    /// Filter one raw event
    ///
    /// Returns `true` when a binding consumed the event; the caller must
    /// then stop any further delivery of it.
    pub fn on_native_event(&self, event: &NativeEvent) -> bool {
        let NativeEvent::KeyPress { keycode, state } = *event else {
            return false;
        };

        // The borrow ends before the handlers run so they may rebind.
        let target = self
            .bindings
            .borrow()
            .iter()
            .filter(|binding| binding.matches(keycode, state))
            .find_map(|binding| binding.listener.upgrade());

        match target {
            Some(listener) => {
                trace!(keycode, state, listener = %listener.id(), "shortcut activated");
                listener.activate();
                true
            }
            None => false,
        }
    }
}

/// Process-scoped owner of the interceptor and the platform handle
pub struct ShortcutContext {
    platform: Rc<dyn KeyGrabPlatform>,
    supported: bool,
    interceptor: OnceCell<Interceptor>,
    next_listener: Cell<u64>,
    /// (keycode, mask) pairs grabbed by some shortcut of this process
    held: RefCell<HashSet<(u32, u32)>>,
}

impl ShortcutContext {
    /// Create the context, probing the session once
    pub fn new(platform: Rc<dyn KeyGrabPlatform>) -> Rc<Self> {
        let supported = platform.session_supported();
        info!(supported, "global shortcut support checked");
        Rc::new(Self {
            platform,
            supported,
            interceptor: OnceCell::new(),
            next_listener: Cell::new(0),
            held: RefCell::new(HashSet::new()),
        })
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn platform(&self) -> &dyn KeyGrabPlatform {
        self.platform.as_ref()
    }

    /// Get the interceptor, installing the event hook on first use
    pub fn ensure_instance(&self) -> &Interceptor {
        self.interceptor.get_or_init(|| {
            match self.platform.install_event_hook() {
                Ok(()) => info!("native event hook installed"),
                Err(e) => error!(?e, "failed to install native event hook"),
            }
            Interceptor::default()
        })
    }

    /// The interceptor, if any shortcut has been registered yet
    pub fn instance(&self) -> Option<&Interceptor> {
        self.interceptor.get()
    }

    /// Route one raw event; returns whether a shortcut consumed it
    pub fn dispatch(&self, event: &NativeEvent) -> bool {
        self.interceptor
            .get()
            .map_or(false, |interceptor| interceptor.on_native_event(event))
    }

    /// Reserve a grab for one shortcut
    ///
    /// The display server lets a client grab the same combination twice,
    /// so a second shortcut of this process asking for a held pair is
    /// refused here. Returns `false` when the pair is already held.
    pub(crate) fn claim_grab(&self, keycode: u32, modifier_mask: u32) -> bool {
        self.held.borrow_mut().insert((keycode, modifier_mask))
    }

    pub(crate) fn release_grab(&self, keycode: u32, modifier_mask: u32) {
        self.held.borrow_mut().remove(&(keycode, modifier_mask));
    }

    pub(crate) fn new_listener(&self) -> Rc<Listener> {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        Rc::new(Listener {
            id: ListenerId(id),
            handlers: RefCell::new(Vec::new()),
        })
    }
}
