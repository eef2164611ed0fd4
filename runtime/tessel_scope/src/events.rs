//! Scope events: `emit` bubbles to the root, `broadcast` walks descendants.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tessel_ir::{Result, Value};
use tracing::{trace, warn};

use crate::scope::{Scope, ScopeInner};

/// Event listener: `(event, args)`.
pub type EventListenerFn = dyn Fn(&Event, &[Value]) -> Result<()>;

pub(crate) struct Listener {
    id: u64,
    func: Box<EventListenerFn>,
    removed: Cell<bool>,
}

/// An event being dispatched.
pub struct Event {
    name: Rc<str>,
    target_scope: Scope,
    current_scope: RefCell<Option<Scope>>,
    stoppable: bool,
    stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    fn new(name: &str, target_scope: &Scope, stoppable: bool) -> Self {
        Event {
            name: Rc::from(name),
            target_scope: target_scope.clone(),
            current_scope: RefCell::new(None),
            stoppable,
            stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scope the event was emitted or broadcast on.
    pub fn target_scope(&self) -> &Scope {
        &self.target_scope
    }

    /// Scope whose listeners are running. `None` once dispatch completes.
    pub fn current_scope(&self) -> Option<Scope> {
        self.current_scope.borrow().clone()
    }

    /// Stop an emitted event from reaching further ancestors. Listeners on
    /// the current scope still run. Broadcasts cannot be stopped.
    pub fn stop_propagation(&self) {
        if self.stoppable {
            self.stopped.set(true);
        }
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("target_scope", &self.target_scope.id())
            .field("stopped", &self.stopped.get())
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}

/// Deregistration handle for an event listener.
#[derive(Clone, Default)]
pub struct ListenerHandle {
    target: Option<(Weak<ScopeInner>, Rc<str>, u64)>,
}

impl ListenerHandle {
    pub fn is_inert(&self) -> bool {
        self.target.is_none()
    }

    pub fn deregister(&self) {
        let Some((scope, name, id)) = &self.target else {
            return;
        };
        let Some(inner) = scope.upgrade() else {
            return;
        };
        let mut listeners = inner.listeners.borrow_mut();
        if let Some(list) = listeners.get_mut(name) {
            if let Some(index) = list.iter().position(|l| l.id == *id) {
                list.remove(index).removed.set(true);
            }
            if list.is_empty() {
                listeners.remove(name);
            }
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some((_, name, id)) => f
                .debug_struct("ListenerHandle")
                .field("name", name)
                .field("id", id)
                .finish(),
            None => f.write_str("ListenerHandle(inert)"),
        }
    }
}

impl Scope {
    /// Listen for `name` on this scope.
    pub fn on(
        &self,
        name: &str,
        listener: impl Fn(&Event, &[Value]) -> Result<()> + 'static,
    ) -> ListenerHandle {
        if self.is_destroyed() {
            warn!(scope = %self.id(), event = name, "listener on destroyed scope ignored");
            return ListenerHandle::default();
        }
        let id = self.0.state.next_listener_id();
        let name: Rc<str> = Rc::from(name);
        self.0
            .listeners
            .borrow_mut()
            .entry(Rc::clone(&name))
            .or_default()
            .push(Rc::new(Listener {
                id,
                func: Box::new(listener),
                removed: Cell::new(false),
            }));
        ListenerHandle {
            target: Some((Rc::downgrade(&self.0), name, id)),
        }
    }

    /// Dispatch `name` on this scope, then on each ancestor up to the root
    /// unless a listener stops propagation.
    pub fn emit(&self, name: &str, args: &[Value]) -> Event {
        trace!(scope = %self.id(), event = name, "emit");
        let event = Event::new(name, self, true);
        let mut next = Some(self.clone());
        while let Some(scope) = next {
            scope.notify(&event, args, "$emit");
            if event.is_propagation_stopped() {
                break;
            }
            next = scope.parent();
        }
        *event.current_scope.borrow_mut() = None;
        event
    }

    /// Dispatch `name` on this scope and every descendant, pre-order.
    pub fn broadcast(&self, name: &str, args: &[Value]) -> Event {
        trace!(scope = %self.id(), event = name, "broadcast");
        let event = Event::new(name, self, false);
        self.broadcast_into(&event, args);
        *event.current_scope.borrow_mut() = None;
        event
    }

    fn broadcast_into(&self, event: &Event, args: &[Value]) {
        self.notify(event, args, "$broadcast");
        for child in self.children() {
            child.broadcast_into(event, args);
        }
    }

    fn notify(&self, event: &Event, args: &[Value], cause: &str) {
        *event.current_scope.borrow_mut() = Some(self.clone());
        let listeners = self
            .0
            .listeners
            .borrow()
            .get(event.name())
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            if listener.removed.get() {
                continue;
            }
            if let Err(err) = (listener.func)(event, args) {
                self.handle_error(&err, cause);
            }
        }
    }
}
