#![forbid(unsafe_code)]

//! Upward change propagation with a re-entrancy guard.
//!
//! # Design
//!
//! One pass runs per completed write. The cursor starts at the written
//! value's node when the value is composite, then moves to the written node
//! and up through its ancestors. At each step:
//!
//! - if the cursor is already in the thread-local *active set*, the ascent
//!   stops (an enclosing pass owns that node and everything above it);
//! - otherwise the node is added to the active set and every subscriber is
//!   called with the same [`Change`].
//!
//! Nodes entered by a pass leave the active set in reverse entry order when
//! the pass's guard drops, which also covers a panicking subscriber.
//!
//! # Failure Modes
//!
//! - **Under-notification**: a second, unrelated write made from inside a
//!   subscriber stops at the first ancestor still active from the outer
//!   pass, so that ancestor's subscribers see only the outer change. This is
//!   the price of never firing a node twice in one synchronous cascade.

use std::cell::RefCell;
use std::collections::HashSet;

use tracing::trace;

use super::node::{Change, NodeKey, ObservableNode};

thread_local! {
    static ACTIVE: RefCell<HashSet<NodeKey>> = RefCell::new(HashSet::new());
}

/// Whether `key` is mid-propagation on this thread.
#[must_use]
pub fn is_active(key: NodeKey) -> bool {
    ACTIVE.with(|active| active.borrow().contains(&key))
}

/// Number of nodes currently mid-propagation on this thread.
#[must_use]
pub fn active_count() -> usize {
    ACTIVE.with(|active| active.borrow().len())
}

/// Clears the nodes a pass entered, newest first.
#[derive(Default)]
struct PassGuard {
    entered: Vec<NodeKey>,
}

impl PassGuard {
    /// Returns `false` if `key` is already active.
    fn enter(&mut self, key: NodeKey) -> bool {
        let inserted = ACTIVE.with(|active| active.borrow_mut().insert(key));
        if inserted {
            self.entered.push(key);
        }
        inserted
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            for key in self.entered.iter().rev() {
                active.remove(key);
            }
        });
    }
}

/// Run one propagation pass for `change`.
///
/// `value_node` is the node of the written value, when it is composite.
/// Returns the number of nodes whose subscribers ran.
pub(crate) fn propagate(change: &Change, value_node: Option<&ObservableNode>) -> usize {
    let mut guard = PassGuard::default();
    let mut cursor = Some(value_node.cloned().unwrap_or_else(|| change.target.clone()));
    let mut from_value = value_node.is_some();

    while let Some(node) = cursor {
        if !guard.enter(node.key()) {
            trace!(
                node = %node.key(),
                property = %change.property,
                "propagation stopped at active node"
            );
            break;
        }
        for callback in node.callbacks_snapshot() {
            callback(change);
        }
        cursor = if from_value {
            from_value = false;
            Some(change.target.clone())
        } else {
            node.parent()
        };
    }
    guard.entered.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl Fn(&Change) + use<> {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(name)
    }

    #[test]
    fn ascent_order_is_leaf_to_root() {
        let root = ObservableNode::from_json(json!({"a": {"b": {"c": 0}}}), None).unwrap();
        let a = root.get("a").as_node().unwrap().clone();
        let b = a.get("b").as_node().unwrap().clone();
        let log = Rc::new(RefCell::new(Vec::new()));
        root.on_change(record(&log, "root"));
        a.on_change(record(&log, "a"));
        b.on_change(record(&log, "b"));

        b.set("c", 1);
        assert_eq!(*log.borrow(), vec!["b", "a", "root"]);
        assert_eq!(active_count(), 0);
    }

    #[test]
    fn composite_write_starts_at_value_node() {
        let root = ObservableNode::from_json(json!({"a": {"b": {}}}), None).unwrap();
        let a = root.get("a").as_node().unwrap().clone();
        let b = a.get("b").as_node().unwrap().clone();
        let log = Rc::new(RefCell::new(Vec::new()));
        root.on_change(record(&log, "root"));
        a.on_change(record(&log, "a"));
        b.on_change(record(&log, "b"));

        a.set("b", json!({"fresh": true}));
        assert_eq!(*log.borrow(), vec!["b", "a", "root"]);
    }

    #[test]
    fn all_subscribers_see_the_same_record() {
        let root = ObservableNode::from_json(json!({"a": {}}), None).unwrap();
        let a = root.get("a").as_node().unwrap().clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for node in [&root, &a] {
            let s = Rc::clone(&seen);
            node.on_change(move |c| {
                s.borrow_mut()
                    .push((c.property.clone(), c.value.clone(), c.target.key()))
            });
        }
        a.set("x", 5);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0].1, Value::from(5));
        assert_eq!(seen[0].2, a.key());
    }

    #[test]
    fn reentrant_write_does_not_refire_ancestor() {
        let root = ObservableNode::from_json(json!({"a": {"x": 0}}), None).unwrap();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let r = root.clone();
        root.on_change(move |_| {
            c.set(c.get() + 1);
            r.get("a").as_node().unwrap().set("x", 99);
        });

        root.get("a").as_node().unwrap().set("x", 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(root.get_path("a.x").as_f64(), Some(99.0));
        assert_eq!(active_count(), 0);
    }

    #[test]
    fn guard_clears_after_panicking_subscriber() {
        let root = ObservableNode::object();
        root.on_change(|_| panic!("subscriber failure"));
        let r = root.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            r.set("k", 1);
        }));
        assert!(result.is_err());
        assert!(!is_active(root.key()));
    }
}
