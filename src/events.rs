//! Synchronous in-process event dispatch.
//!
//! The release pipeline is single-threaded and event-driven: the driver
//! subscribes per-run handlers, the compile step emits re-enqueue and
//! completion events, and every handler runs synchronously inside the
//! emitting call.
//!
//! Subscriptions are scoped: [`EventBus::subscribe`] returns a
//! [`Subscription`] guard that removes the handler when dropped. A driver
//! run holds its guards for the duration of the run, so repeated runs can
//! never observe a previous run's handlers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::file::ProjectFile;
use crate::release::Phase;

/// Event discriminant used for subscription routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CompileStart,
    CompileEnd,
    CompileAdd,
    ProcessEnd,
    ConfigLoaded,
    ReleaseStart,
    ReleaseEnd,
    PhaseStart,
}

/// An event flowing through the bus.
#[derive(Debug, Clone)]
pub enum Event {
    /// A file is about to be compiled. Carries the file so listeners can
    /// register it into their working set.
    CompileStart { file: ProjectFile },
    /// A file finished compiling. The authoritative copy lives in the
    /// working set by the time this fires.
    CompileEnd { subpath: String },
    /// Request to enqueue another file into the current compile queue.
    CompileAdd { file: ProjectFile },
    /// Per-file post-processing finished.
    ProcessEnd { subpath: String },
    /// Configuration became available.
    ConfigLoaded,
    /// A release run started.
    ReleaseStart,
    /// A release run finished.
    ReleaseEnd,
    /// A packaging phase is about to run.
    PhaseStart { phase: Phase },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CompileStart { .. } => EventKind::CompileStart,
            Event::CompileEnd { .. } => EventKind::CompileEnd,
            Event::CompileAdd { .. } => EventKind::CompileAdd,
            Event::ProcessEnd { .. } => EventKind::ProcessEnd,
            Event::ConfigLoaded => EventKind::ConfigLoaded,
            Event::ReleaseStart => EventKind::ReleaseStart,
            Event::ReleaseEnd => EventKind::ReleaseEnd,
            Event::PhaseStart { .. } => EventKind::PhaseStart,
        }
    }
}

type HandlerFn = Rc<dyn Fn(&Event)>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, HandlerFn)>>,
}

/// Synchronous publish/subscribe bus.
///
/// Cloning the bus yields another handle to the same handler table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler for one event kind.
    ///
    /// The handler stays active until the returned guard is dropped.
    #[must_use = "dropping the subscription removes the handler"]
    pub fn subscribe(&self, kind: EventKind, handler: impl Fn(&Event) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.entry(kind).or_default().push((id, Rc::new(handler)));
        Subscription { bus: Rc::downgrade(&self.inner), kind, id }
    }

    /// Dispatch an event to every active handler of its kind, in
    /// subscription order.
    ///
    /// The handler list is snapshotted before dispatch, so handlers may
    /// emit further events or add subscriptions re-entrantly; additions
    /// take effect from the next emit.
    pub fn emit(&self, event: &Event) {
        let snapshot: Vec<HandlerFn> = {
            let inner = self.inner.borrow();
            match inner.handlers.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, f)| Rc::clone(f)).collect(),
                None => return,
            }
        };
        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of active handlers for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.borrow().handlers.get(&kind).map_or(0, Vec::len)
    }
}

/// Guard tying a handler's lifetime to a scope.
pub struct Subscription {
    bus: Weak<RefCell<BusInner>>,
    kind: EventKind,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            if let Some(list) = inner.borrow_mut().handlers.get_mut(&self.kind) {
                list.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
