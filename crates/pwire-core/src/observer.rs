#![forbid(unsafe_code)]

//! Intersection and resize observers over host-reported geometry.
//!
//! # Design
//!
//! The host reports geometry through the [`Window`](crate::window::Window)
//! (`set_intersection_ratio`, `set_element_size`). Each observer keeps a
//! working set of targets together with the last state it reported, and
//! queues an entry whenever a target's state changes. Entries are delivered
//! in batches at the window's flush, never synchronously from the geometry
//! update.
//!
//! # Invariants
//!
//! 1. Observing a target queues one initial entry describing its current
//!    state (browser semantics).
//! 2. After the initial entry, an intersection entry is queued only when the
//!    target's `is_intersecting` flips; a resize entry only when its size
//!    changes.
//! 3. Unobserving drops the target and any of its undelivered entries.
//! 4. Callbacks run with no interior borrow held and may observe, unobserve,
//!    or change geometry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dom::NodeId;

/// Host-reported layout facts shared by all observers of a window.
#[derive(Debug, Default)]
pub struct Geometry {
    ratios: HashMap<NodeId, f64>,
    sizes: HashMap<NodeId, (f64, f64)>,
}

impl Geometry {
    /// Visible fraction of `target` in `[0, 1]`. Unknown targets are not visible.
    #[must_use]
    pub fn intersection_ratio(&self, target: NodeId) -> f64 {
        self.ratios.get(&target).copied().unwrap_or(0.0)
    }

    pub fn set_intersection_ratio(&mut self, target: NodeId, ratio: f64) {
        self.ratios.insert(target, ratio.clamp(0.0, 1.0));
    }

    /// Content-box size of `target`. Unknown targets are `(0, 0)`.
    #[must_use]
    pub fn size(&self, target: NodeId) -> (f64, f64) {
        self.sizes.get(&target).copied().unwrap_or((0.0, 0.0))
    }

    pub fn set_size(&mut self, target: NodeId, width: f64, height: f64) {
        self.sizes.insert(target, (width.max(0.0), height.max(0.0)));
    }
}

pub(crate) type SharedGeometry = Rc<RefCell<Geometry>>;

// ---------------------------------------------------------------------------
// Intersection
// ---------------------------------------------------------------------------

/// One visibility report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: NodeId,
    pub intersection_ratio: f64,
    pub is_intersecting: bool,
}

type IntersectionCallback = Rc<dyn Fn(&[IntersectionEntry], &IntersectionObserver)>;

pub(crate) struct IntersectionInner {
    threshold: f64,
    callback: IntersectionCallback,
    targets: Vec<(NodeId, bool)>,
    pending: Vec<IntersectionEntry>,
    geometry: SharedGeometry,
}

/// Visibility observer with a single threshold.
///
/// Cloning creates a new handle to the same observer.
#[derive(Clone)]
pub struct IntersectionObserver {
    inner: Rc<RefCell<IntersectionInner>>,
}

impl fmt::Debug for IntersectionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("IntersectionObserver")
            .field("threshold", &inner.threshold)
            .field("targets", &inner.targets.len())
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl IntersectionObserver {
    pub(crate) fn new(
        threshold: f64,
        geometry: SharedGeometry,
        callback: impl Fn(&[IntersectionEntry], &IntersectionObserver) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(IntersectionInner {
                threshold: threshold.clamp(0.0, 1.0),
                callback: Rc::new(callback),
                targets: Vec::new(),
                pending: Vec::new(),
                geometry,
            })),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<IntersectionInner>> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RefCell<IntersectionInner>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.inner.borrow().threshold
    }

    fn entry_for(inner: &IntersectionInner, target: NodeId) -> IntersectionEntry {
        let ratio = inner.geometry.borrow().intersection_ratio(target);
        IntersectionEntry {
            target,
            intersection_ratio: ratio,
            is_intersecting: ratio > 0.0 && ratio >= inner.threshold,
        }
    }

    /// Start observing `target`. Observing an already observed target is a no-op.
    pub fn observe(&self, target: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if inner.targets.iter().any(|(t, _)| *t == target) {
            return;
        }
        let entry = Self::entry_for(&inner, target);
        inner.targets.push((target, entry.is_intersecting));
        inner.pending.push(entry);
    }

    /// Stop observing `target`.
    pub fn unobserve(&self, target: NodeId) {
        let mut inner = self.inner.borrow_mut();
        inner.targets.retain(|(t, _)| *t != target);
        inner.pending.retain(|e| e.target != target);
    }

    #[must_use]
    pub fn is_observing(&self, target: NodeId) -> bool {
        self.inner.borrow().targets.iter().any(|(t, _)| *t == target)
    }

    #[must_use]
    pub fn target_count(&self) -> usize {
        self.inner.borrow().targets.len()
    }

    /// Queue entries for targets whose intersecting state flipped.
    pub(crate) fn recompute(&self) {
        let mut inner = self.inner.borrow_mut();
        let mut changed = Vec::new();
        for (target, last) in &inner.targets {
            let entry = Self::entry_for(&inner, *target);
            if entry.is_intersecting != *last {
                changed.push(entry);
            }
        }
        for entry in changed {
            if let Some((_, last)) = inner.targets.iter_mut().find(|(t, _)| *t == entry.target) {
                *last = entry.is_intersecting;
            }
            inner.pending.push(entry);
        }
    }

    /// Deliver queued entries in one callback. Returns the number delivered.
    pub(crate) fn deliver(&self) -> usize {
        let (callback, entries) = {
            let mut inner = self.inner.borrow_mut();
            if inner.pending.is_empty() {
                return 0;
            }
            (Rc::clone(&inner.callback), std::mem::take(&mut inner.pending))
        };
        callback(&entries, self);
        entries.len()
    }
}

// ---------------------------------------------------------------------------
// Resize
// ---------------------------------------------------------------------------

/// One size report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeEntry {
    pub target: NodeId,
    pub width: f64,
    pub height: f64,
}

type ResizeCallback = Rc<dyn Fn(&[ResizeEntry], &ResizeObserver)>;

pub(crate) struct ResizeInner {
    callback: ResizeCallback,
    targets: Vec<(NodeId, (f64, f64))>,
    pending: Vec<ResizeEntry>,
    geometry: SharedGeometry,
}

/// Element size observer.
#[derive(Clone)]
pub struct ResizeObserver {
    inner: Rc<RefCell<ResizeInner>>,
}

impl fmt::Debug for ResizeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ResizeObserver")
            .field("targets", &inner.targets.len())
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl ResizeObserver {
    pub(crate) fn new(
        geometry: SharedGeometry,
        callback: impl Fn(&[ResizeEntry], &ResizeObserver) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ResizeInner {
                callback: Rc::new(callback),
                targets: Vec::new(),
                pending: Vec::new(),
                geometry,
            })),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<ResizeInner>> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RefCell<ResizeInner>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn observe(&self, target: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if inner.targets.iter().any(|(t, _)| *t == target) {
            return;
        }
        let (width, height) = inner.geometry.borrow().size(target);
        inner.targets.push((target, (width, height)));
        inner.pending.push(ResizeEntry {
            target,
            width,
            height,
        });
    }

    pub fn unobserve(&self, target: NodeId) {
        let mut inner = self.inner.borrow_mut();
        inner.targets.retain(|(t, _)| *t != target);
        inner.pending.retain(|e| e.target != target);
    }

    #[must_use]
    pub fn is_observing(&self, target: NodeId) -> bool {
        self.inner.borrow().targets.iter().any(|(t, _)| *t == target)
    }

    pub(crate) fn recompute(&self) {
        let mut inner = self.inner.borrow_mut();
        let geometry = Rc::clone(&inner.geometry);
        let geometry = geometry.borrow();
        let mut queued = Vec::new();
        for (target, last) in &mut inner.targets {
            let size = geometry.size(*target);
            if size != *last {
                *last = size;
                queued.push(ResizeEntry {
                    target: *target,
                    width: size.0,
                    height: size.1,
                });
            }
        }
        inner.pending.extend(queued);
    }

    pub(crate) fn deliver(&self) -> usize {
        let (callback, entries) = {
            let mut inner = self.inner.borrow_mut();
            if inner.pending.is_empty() {
                return 0;
            }
            (Rc::clone(&inner.callback), std::mem::take(&mut inner.pending))
        };
        callback(&entries, self);
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn geometry() -> SharedGeometry {
        Rc::new(RefCell::new(Geometry::default()))
    }

    #[test]
    fn observe_queues_initial_entry() {
        let geo = geometry();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let io = IntersectionObserver::new(0.01, Rc::clone(&geo), move |entries, _| {
            s.borrow_mut().extend_from_slice(entries);
        });
        let target = crate::dom::Document::new().body();
        io.observe(target);
        io.observe(target);
        assert_eq!(io.deliver(), 1);
        assert!(!seen.borrow()[0].is_intersecting);
    }

    #[test]
    fn only_transitions_are_queued() {
        let geo = geometry();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let io = IntersectionObserver::new(0.01, Rc::clone(&geo), move |entries, _| {
            c.set(c.get() + entries.len());
        });
        let target = crate::dom::Document::new().body();
        io.observe(target);
        io.deliver();

        geo.borrow_mut().set_intersection_ratio(target, 0.5);
        io.recompute();
        geo.borrow_mut().set_intersection_ratio(target, 0.8);
        io.recompute();
        io.deliver();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn below_threshold_is_not_intersecting() {
        let geo = geometry();
        let io = IntersectionObserver::new(0.5, Rc::clone(&geo), |_, _| {});
        let target = crate::dom::Document::new().body();
        geo.borrow_mut().set_intersection_ratio(target, 0.3);
        let inner = io.inner.borrow();
        assert!(!IntersectionObserver::entry_for(&inner, target).is_intersecting);
    }

    #[test]
    fn unobserve_inside_callback() {
        let geo = geometry();
        let io = IntersectionObserver::new(0.0, Rc::clone(&geo), |entries, observer| {
            for e in entries {
                observer.unobserve(e.target);
            }
        });
        let target = crate::dom::Document::new().body();
        io.observe(target);
        io.deliver();
        assert_eq!(io.target_count(), 0);
    }

    #[test]
    fn resize_queues_on_size_change_only() {
        let geo = geometry();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let ro = ResizeObserver::new(Rc::clone(&geo), move |entries, _| {
            c.set(c.get() + entries.len());
        });
        let target = crate::dom::Document::new().body();
        ro.observe(target);
        ro.recompute();
        geo.borrow_mut().set_size(target, 100.0, 50.0);
        ro.recompute();
        ro.recompute();
        ro.deliver();
        assert_eq!(count.get(), 2);
    }
}
