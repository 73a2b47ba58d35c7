//! `EventBus`: synchronous, per-family typed dispatch.
//!
//! One [`Dispatcher`] per event family (window, mouse, key, collision). Each keeps a
//! `type -> handler list` map plus a side table from [`HandleId`] to the bucket it lives
//! in, so `RemoveListener` doesn't need to know the event type up front. The bus never
//! queues: `Send` walks the bucket in registration order and calls each handler
//! synchronously on the calling thread, stopping early once a handler marks the event
//! `handled`.
//!
//! Handler-list mutations requested while a `Send` is in progress must not be visible
//! to that same `Send` — they take effect only starting with the next one. This is
//! handled by buffering add/remove calls while `dispatching` is set and draining them
//! once the current `Send` returns.

use std::collections::HashMap;

use tracing::trace;

use crate::entity::EntityId;

/// Opaque handle returned by `AddListener`. Never compares callable identity (Design
/// Note: "Event handler identity" — function-pointer comparison is unsound across bound
/// member functions / closures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

/// Window-level events. Losing focus pauses the game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    Resize { width: u32, height: u32 },
    Close,
    Focus,
    LostFocus,
    Moved { x: i32, y: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEventKind {
    Resize,
    Close,
    Focus,
    LostFocus,
    Moved,
}

impl WindowEvent {
    pub fn kind(&self) -> WindowEventKind {
        match self {
            WindowEvent::Resize { .. } => WindowEventKind::Resize,
            WindowEvent::Close => WindowEventKind::Close,
            WindowEvent::Focus => WindowEventKind::Focus,
            WindowEvent::LostFocus => WindowEventKind::LostFocus,
            WindowEvent::Moved { .. } => WindowEventKind::Moved,
        }
    }
}

/// Mouse button index (0=left, 1=right, 2=middle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEvent {
    Move { x: f32, y: f32 },
    Button { button: MouseButton, pressed: bool, x: f32, y: f32 },
    Scroll { dx: f32, dy: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    Move,
    Button,
    Scroll,
}

impl MouseEvent {
    pub fn kind(&self) -> MouseEventKind {
        match self {
            MouseEvent::Move { .. } => MouseEventKind::Move,
            MouseEvent::Button { .. } => MouseEventKind::Button,
            MouseEvent::Scroll { .. } => MouseEventKind::Scroll,
        }
    }
}

/// Key event. `code` is an ASCII keycode in the printable range, or an opaque integer
/// for non-printable keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u32,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    Pressed,
    Released,
}

impl KeyEvent {
    pub fn kind(&self) -> KeyEventKind {
        if self.pressed { KeyEventKind::Pressed } else { KeyEventKind::Released }
    }
}

/// Collision/trigger event kinds. `OnTriggerStay`-style continuous events fire once per
/// physics step while the pair keeps overlapping, not once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionEventKind {
    Enter,
    Stay,
    Exit,
    TriggerEnter,
    TriggerStay,
    TriggerExit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub a: EntityId,
    pub b: EntityId,
    pub kind: CollisionEventKind,
}

/// Wraps an event payload with the mutable `handled` flag handlers may set to stop
/// propagation to later handlers in the same `send`. The payload itself stays read-only
/// to handlers.
pub struct EventEnvelope<E> {
    pub event: E,
    pub handled: bool,
}

type Handler<E> = Box<dyn FnMut(&mut EventEnvelope<E>)>;

enum PendingOp<K, E> {
    Add(K, HandleId, Handler<E>),
    Remove(HandleId),
}

/// Typed dispatcher for a single event family. `K` is the per-family event-type tag
/// (e.g. [`WindowEventKind`]); `E` is the event payload type.
pub struct Dispatcher<K, E> {
    buckets: HashMap<K, Vec<(HandleId, Handler<E>)>>,
    handle_kind: HashMap<HandleId, K>,
    next_handle: u64,
    dispatching: bool,
    pending: Vec<PendingOp<K, E>>,
}

impl<K: Eq + std::hash::Hash + Copy, E> Dispatcher<K, E> {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            handle_kind: HashMap::new(),
            next_handle: 0,
            dispatching: false,
            pending: Vec::new(),
        }
    }

    /// `AddListener(type, handler) -> HandleId`. O(1) append, or buffered until the
    /// current `Send` finishes if called from inside a handler.
    pub fn add_listener(
        &mut self,
        kind: K,
        handler: impl FnMut(&mut EventEnvelope<E>) + 'static,
    ) -> HandleId {
        let id = HandleId(self.next_handle);
        self.next_handle += 1;
        let boxed: Handler<E> = Box::new(handler);
        if self.dispatching {
            self.pending.push(PendingOp::Add(kind, id, boxed));
        } else {
            self.buckets.entry(kind).or_default().push((id, boxed));
            self.handle_kind.insert(id, kind);
        }
        id
    }

    /// `RemoveListener(HandleId)`. O(n) scan of the owning bucket; a handle that was
    /// already removed (or never existed) is a no-op, not an error.
    pub fn remove_listener(&mut self, id: HandleId) {
        if self.dispatching {
            self.pending.push(PendingOp::Remove(id));
            return;
        }
        if let Some(kind) = self.handle_kind.remove(&id) {
            if let Some(bucket) = self.buckets.get_mut(&kind) {
                bucket.retain(|(hid, _)| *hid != id);
            }
        }
    }

    /// `Send(event)`. Invokes handlers registered for `event`'s kind in registration
    /// order, stopping once a handler sets `handled = true`. Mutations requested by
    /// handlers during this call take effect only after it returns.
    pub fn send(&mut self, kind: K, event: E) -> bool {
        let mut envelope = EventEnvelope { event, handled: false };
        self.dispatching = true;
        if let Some(bucket) = self.buckets.get_mut(&kind) {
            for (_, handler) in bucket.iter_mut() {
                handler(&mut envelope);
                if envelope.handled {
                    break;
                }
            }
        }
        self.dispatching = false;
        self.drain_pending();
        envelope.handled
    }

    fn drain_pending(&mut self) {
        for op in std::mem::take(&mut self.pending) {
            match op {
                PendingOp::Add(kind, id, handler) => {
                    self.buckets.entry(kind).or_default().push((id, handler));
                    self.handle_kind.insert(id, kind);
                }
                PendingOp::Remove(id) => self.remove_listener(id),
            }
        }
    }

    pub fn listener_count(&self, kind: K) -> usize {
        self.buckets.get(&kind).map(Vec::len).unwrap_or(0)
    }
}

impl<K: Eq + std::hash::Hash + Copy, E> Default for Dispatcher<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide dispatch hub: one dispatcher per event family. Consumed as an explicit
/// field on the engine's `Services`-style context, per Design Note "Singletons for
/// Managers" — never reached for as a global.
#[derive(Default)]
pub struct EventBus {
    pub window: Dispatcher<WindowEventKind, WindowEvent>,
    pub mouse: Dispatcher<MouseEventKind, MouseEvent>,
    pub key: Dispatcher<KeyEventKind, KeyEvent>,
    pub collision: Dispatcher<CollisionEventKind, CollisionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_window(&mut self, event: WindowEvent) -> bool {
        trace!(?event, "window event");
        self.window.send(event.kind(), event)
    }

    pub fn send_mouse(&mut self, event: MouseEvent) -> bool {
        self.mouse.send(event.kind(), event)
    }

    pub fn send_key(&mut self, event: KeyEvent) -> bool {
        self.key.send(event.kind(), event)
    }

    pub fn send_collision(&mut self, event: CollisionEvent) -> bool {
        trace!(a = event.a.0, b = event.b.0, kind = ?event.kind, "collision event");
        self.collision.send(event.kind, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn handlers_fire_in_registration_order() {
        let mut bus: Dispatcher<WindowEventKind, WindowEvent> = Dispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = order.clone();
        bus.add_listener(WindowEventKind::Close, move |_| o1.borrow_mut().push(1));
        let o2 = order.clone();
        bus.add_listener(WindowEventKind::Close, move |_| o2.borrow_mut().push(2));

        bus.send(WindowEventKind::Close, WindowEvent::Close);
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn handled_stops_later_handlers() {
        let mut bus: Dispatcher<WindowEventKind, WindowEvent> = Dispatcher::new();
        let calls = Rc::new(RefCell::new(0));

        bus.add_listener(WindowEventKind::Close, |env| env.handled = true);
        let c = calls.clone();
        bus.add_listener(WindowEventKind::Close, move |_| *c.borrow_mut() += 1);

        bus.send(WindowEventKind::Close, WindowEvent::Close);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn listener_added_between_sends_is_invisible_to_the_earlier_one() {
        // A registration made after `send` has already returned only ever affects later
        // `Send` calls — the ordinary, un-buffered path `add_listener` takes outside of
        // dispatch.
        let mut bus: Dispatcher<WindowEventKind, WindowEvent> = Dispatcher::new();
        let calls = Rc::new(RefCell::new(0));

        bus.send(WindowEventKind::Close, WindowEvent::Close);
        assert_eq!(*calls.borrow(), 0);

        let c = calls.clone();
        bus.add_listener(WindowEventKind::Close, move |_| *c.borrow_mut() += 1);
        bus.send(WindowEventKind::Close, WindowEvent::Close);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn remove_already_removed_handle_is_noop() {
        let mut bus: Dispatcher<WindowEventKind, WindowEvent> = Dispatcher::new();
        let id = bus.add_listener(WindowEventKind::Close, |_| {});
        bus.remove_listener(id);
        bus.remove_listener(id); // should not panic
        assert_eq!(bus.listener_count(WindowEventKind::Close), 0);
    }

    #[test]
    fn add_then_remove_then_add_yields_same_dispatch_as_never_added() {
        let mut bus: Dispatcher<WindowEventKind, WindowEvent> = Dispatcher::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let id = {
            let c = calls.clone();
            bus.add_listener(WindowEventKind::Close, move |_| c.borrow_mut().push("h1"))
        };
        bus.remove_listener(id);
        let c = calls.clone();
        bus.add_listener(WindowEventKind::Close, move |_| c.borrow_mut().push("h2"));

        bus.send(WindowEventKind::Close, WindowEvent::Close);
        assert_eq!(*calls.borrow(), vec!["h2"]);
    }

    #[test]
    fn event_bus_routes_by_family() {
        let mut bus = EventBus::new();
        let fired = Rc::new(RefCell::new(false));
        let f = fired.clone();
        bus.key.add_listener(KeyEventKind::Pressed, move |_| *f.borrow_mut() = true);
        bus.send_key(KeyEvent { code: 65, pressed: true });
        assert!(*fired.borrow());
    }
}
