#![forbid(unsafe_code)]

//! Host-driven window: document, virtual clock, observers, and sinks.
//!
//! # Design
//!
//! [`Window`] is the single entry point through which the host drives a
//! page. Every host input (an event, a clock advance, a resize, a geometry
//! report) runs synchronously and is followed by [`Window::flush`], the
//! microtask checkpoint at which queued attribute records and observer
//! entries are delivered. Nothing runs between host calls.
//!
//! ```text
//! host ──► dispatch_event / advance / resize / set_intersection_ratio
//!              │
//!              ▼
//!         listeners + due timers run
//!              │
//!              ▼
//!         flush(): mutations → intersection → resize, until quiescent
//! ```
//!
//! # Failure Modes
//!
//! - A callback that keeps producing new records on every delivery would
//!   loop forever; flush gives up after [`MAX_FLUSH_ROUNDS`] rounds and
//!   leaves the remainder queued for the next checkpoint.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::dom::{Document, NodeId};
use crate::event::{Event, ListenerId};
use crate::observer::{
    Geometry, IntersectionEntry, IntersectionInner, IntersectionObserver, ResizeEntry,
    ResizeInner, ResizeObserver, SharedGeometry,
};
use crate::timer::{TimerId, TimerQueue};

/// Upper bound on delivery rounds per flush.
pub const MAX_FLUSH_ROUNDS: usize = 64;

/// A file handed to the host for saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

type WindowListener = Rc<dyn Fn(&Event)>;

struct WindowInner {
    document: Document,
    timers: RefCell<TimerQueue>,
    geometry: SharedGeometry,
    viewport: Cell<(f64, f64)>,
    listeners: RefCell<Vec<(ListenerId, String, WindowListener)>>,
    next_listener: Cell<u64>,
    intersection_observers: RefCell<Vec<Weak<RefCell<IntersectionInner>>>>,
    resize_observers: RefCell<Vec<Weak<RefCell<ResizeInner>>>>,
    alerts: RefCell<Vec<String>>,
    downloads: RefCell<Vec<Download>>,
}

/// Shared handle to the host window.
///
/// Cloning creates a new handle to the **same** window.
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("viewport", &self.inner.viewport.get())
            .field("now", &self.now())
            .field("pending_timers", &self.inner.timers.borrow().len())
            .field("alerts", &self.inner.alerts.borrow().len())
            .finish()
    }
}

impl Window {
    /// Create a window around `document` with a 1024×768 viewport.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            inner: Rc::new(WindowInner {
                document,
                timers: RefCell::new(TimerQueue::new()),
                geometry: Rc::new(RefCell::new(Geometry::default())),
                viewport: Cell::new((1024.0, 768.0)),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                intersection_observers: RefCell::new(Vec::new()),
                resize_observers: RefCell::new(Vec::new()),
                alerts: RefCell::new(Vec::new()),
                downloads: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -- Events -------------------------------------------------------------

    /// Dispatch a host event to `target`, then flush.
    pub fn dispatch_event(&self, target: NodeId, event: &Event) -> bool {
        let not_cancelled = self.inner.document.dispatch_event(target, event);
        self.flush();
        not_cancelled
    }

    /// Listen for window-level events (`resize`).
    pub fn add_event_listener(
        &self,
        kind: &str,
        callback: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let next = self.inner.next_listener.get() + 1;
        self.inner.next_listener.set(next);
        let id = ListenerId(next);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, kind.to_owned(), Rc::new(callback)));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(l, _, _)| *l != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| k == kind)
            .count()
    }

    /// Change the viewport size, fire `resize` listeners, then flush.
    pub fn resize(&self, width: f64, height: f64) {
        self.inner.viewport.set((width, height));
        let snapshot: Vec<WindowListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| k == "resize")
            .map(|(_, _, cb)| Rc::clone(cb))
            .collect();
        let event = Event::new("resize");
        for callback in snapshot {
            callback(&event);
        }
        self.flush();
    }

    #[must_use]
    pub fn viewport(&self) -> (f64, f64) {
        self.inner.viewport.get()
    }

    // -- Geometry -----------------------------------------------------------

    /// Report how much of `target` is visible, then flush.
    pub fn set_intersection_ratio(&self, target: NodeId, ratio: f64) {
        self.inner
            .geometry
            .borrow_mut()
            .set_intersection_ratio(target, ratio);
        for observer in self.live_intersection_observers() {
            observer.recompute();
        }
        self.flush();
    }

    /// Report the laid-out size of `target`, then flush.
    pub fn set_element_size(&self, target: NodeId, width: f64, height: f64) {
        self.inner.geometry.borrow_mut().set_size(target, width, height);
        for observer in self.live_resize_observers() {
            observer.recompute();
        }
        self.flush();
    }

    #[must_use]
    pub fn element_size(&self, target: NodeId) -> (f64, f64) {
        self.inner.geometry.borrow().size(target)
    }

    #[must_use]
    pub fn intersection_ratio(&self, target: NodeId) -> f64 {
        self.inner.geometry.borrow().intersection_ratio(target)
    }

    /// Create an intersection observer bound to this window.
    pub fn intersection_observer(
        &self,
        threshold: f64,
        callback: impl Fn(&[IntersectionEntry], &IntersectionObserver) + 'static,
    ) -> IntersectionObserver {
        let observer =
            IntersectionObserver::new(threshold, Rc::clone(&self.inner.geometry), callback);
        self.inner
            .intersection_observers
            .borrow_mut()
            .push(observer.downgrade());
        observer
    }

    /// Create a resize observer bound to this window.
    pub fn resize_observer(
        &self,
        callback: impl Fn(&[ResizeEntry], &ResizeObserver) + 'static,
    ) -> ResizeObserver {
        let observer = ResizeObserver::new(Rc::clone(&self.inner.geometry), callback);
        self.inner
            .resize_observers
            .borrow_mut()
            .push(observer.downgrade());
        observer
    }

    fn live_intersection_observers(&self) -> Vec<IntersectionObserver> {
        let mut list = self.inner.intersection_observers.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        list.iter().filter_map(IntersectionObserver::upgrade).collect()
    }

    fn live_resize_observers(&self) -> Vec<ResizeObserver> {
        let mut list = self.inner.resize_observers.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        list.iter().filter_map(ResizeObserver::upgrade).collect()
    }

    // -- Timers -------------------------------------------------------------

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.timers.borrow().now()
    }

    /// Run `task` after `delay` of virtual time.
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        self.inner.timers.borrow_mut().schedule(delay, Box::new(task))
    }

    /// Cancel a pending timer. Cancelling a fired or unknown timer is a no-op.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }

    #[must_use]
    pub fn is_timer_pending(&self, id: TimerId) -> bool {
        self.inner.timers.borrow().is_pending(id)
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Advance the clock by `dt`, running due timers in order and flushing
    /// after each one. Returns the number of timers fired.
    pub fn advance(&self, dt: Duration) -> usize {
        let until = self.now() + dt;
        let mut fired = 0;
        loop {
            let due = self.inner.timers.borrow_mut().pop_due(until);
            let Some((_id, task)) = due else {
                break;
            };
            #[cfg(feature = "tracing")]
            tracing::trace!(timer = %_id, "timer fired");
            task();
            fired += 1;
            self.flush();
        }
        self.inner.timers.borrow_mut().set_now(until);
        fired
    }

    // -- Microtask checkpoint -----------------------------------------------

    /// Deliver queued attribute records and observer entries until nothing
    /// is left (or [`MAX_FLUSH_ROUNDS`] is reached). Returns the number of
    /// records delivered.
    pub fn flush(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let mut round = self.inner.document.deliver_mutations();
            for observer in self.live_intersection_observers() {
                round += observer.deliver();
            }
            for observer in self.live_resize_observers() {
                round += observer.deliver();
            }
            if round == 0 {
                return total;
            }
            total += round;
        }
        #[cfg(feature = "tracing")]
        tracing::warn!(
            rounds = MAX_FLUSH_ROUNDS,
            delivered = total,
            "flush did not settle"
        );
        total
    }

    // -- Sinks --------------------------------------------------------------

    /// Show a blocking, user-visible message. Recorded for the host.
    pub fn alert(&self, message: impl Into<String>) {
        let message = message.into();
        #[cfg(feature = "tracing")]
        tracing::error!(text = %message, "alert");
        self.inner.alerts.borrow_mut().push(message);
    }

    /// Messages shown through [`alert`](Self::alert), oldest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.inner.alerts.borrow().clone()
    }

    /// Drain recorded alerts.
    pub fn take_alerts(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.alerts.borrow_mut())
    }

    /// Offer a file to the user.
    pub fn download(
        &self,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) {
        let download = Download {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            file_name = %download.file_name,
            bytes = download.bytes.len(),
            "download offered"
        );
        self.inner.downloads.borrow_mut().push(download);
    }

    #[must_use]
    pub fn downloads(&self) -> Vec<Download> {
        self.inner.downloads.borrow().clone()
    }
}
