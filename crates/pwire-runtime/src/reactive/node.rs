#![forbid(unsafe_code)]

//! Observable object/array nodes.
//!
//! # Design
//!
//! An [`ObservableNode`] wraps exactly one object (string keys) or array
//! (index keys) in shared, reference-counted storage. Nested composites are
//! wrapped lazily: a raw object read through [`get`](ObservableNode::get) is
//! wrapped with this node as parent and written back in place, so every later
//! read returns the same handle.
//!
//! Writes through [`set`](ObservableNode::set) run the full sequence:
//!
//! 1. wrap a raw composite value with this node as parent,
//! 2. copy the subscribers of the node being replaced onto the new node,
//! 3. assign,
//! 4. propagate the change up the ownership chain
//!    (see [`propagation`](super::propagation)),
//! 5. report whether the assignment happened.
//!
//! # Invariants
//!
//! 1. `wrap` of an existing node returns that node; parents are never
//!    reassigned on a node that already has one.
//! 2. Parent links are weak; children never keep their parent alive.
//! 3. Keys starting with `_` are bookkeeping: stored verbatim, never wrapped,
//!    never propagated, never exported by `copy_raw`.
//! 4. No interior borrow is held while subscribers run.
//!
//! # Failure Modes
//!
//! - **Subscriber growth**: there is no unsubscribe. Subscriptions live as
//!   long as the node (and are copied onto replacements).
//! - **Array misuse**: writing a non-index key on an array node returns
//!   `false` and does not propagate.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::propagation;
use super::value::{Value, is_private_key};
use crate::error::WrapError;

/// Most `null` slots a single array write may create past the end.
pub const MAX_ARRAY_GAP: usize = 1024;

/// Identity of a node, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs#{}", self.0)
    }
}

thread_local! {
    static NEXT_KEY: Cell<u64> = const { Cell::new(0) };
}

fn next_key() -> NodeKey {
    NEXT_KEY.with(|n| {
        let key = n.get() + 1;
        n.set(key);
        NodeKey(key)
    })
}

/// The record every subscriber receives for one write.
#[derive(Debug, Clone)]
pub struct Change {
    /// Property that was written, e.g. `"value"` or `"3"`.
    pub property: String,
    /// Value after the write (wrapped if composite).
    pub value: Value,
    /// Node that was written to.
    pub target: ObservableNode,
}

pub(crate) type ChangeCallback = Rc<dyn Fn(&Change)>;

#[derive(Debug)]
enum NodeData {
    Object(BTreeMap<String, Value>),
    Array(Vec<Value>),
}

struct NodeInner {
    key: NodeKey,
    parent: RefCell<Option<Weak<NodeInner>>>,
    data: RefCell<NodeData>,
    callbacks: RefCell<Vec<ChangeCallback>>,
}

/// Shared handle to an observable object or array.
///
/// Cloning creates a new handle to the **same** node.
pub struct ObservableNode {
    inner: Rc<NodeInner>,
}

impl Clone for ObservableNode {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for ObservableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.data.borrow();
        let (kind, len) = match &*data {
            NodeData::Object(map) => ("object", map.len()),
            NodeData::Array(items) => ("array", items.len()),
        };
        f.debug_struct("ObservableNode")
            .field("key", &self.inner.key)
            .field("kind", &kind)
            .field("len", &len)
            .field("subscriber_count", &self.inner.callbacks.borrow().len())
            .finish()
    }
}

impl ObservableNode {
    fn from_data(data: NodeData, parent: Option<&ObservableNode>) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                key: next_key(),
                parent: RefCell::new(parent.map(|p| Rc::downgrade(&p.inner))),
                data: RefCell::new(data),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Empty root object.
    #[must_use]
    pub fn object() -> Self {
        Self::from_data(NodeData::Object(BTreeMap::new()), None)
    }

    /// Empty root array.
    #[must_use]
    pub fn array() -> Self {
        Self::from_data(NodeData::Array(Vec::new()), None)
    }

    /// Wrap a composite value.
    ///
    /// An existing node is returned unchanged (its parent is not touched).
    /// Raw objects and arrays are wrapped shallowly with `parent`; their
    /// nested composites stay raw until first read.
    pub fn wrap(value: Value, parent: Option<&ObservableNode>) -> Result<Self, WrapError> {
        match value {
            Value::Node(node) => Ok(node),
            Value::Raw(json) => Self::from_json(json, parent),
            other => Err(WrapError::NotComposite { kind: other.kind() }),
        }
    }

    /// Wrap a JSON object or array.
    pub fn from_json(
        json: serde_json::Value,
        parent: Option<&ObservableNode>,
    ) -> Result<Self, WrapError> {
        let data = match json {
            serde_json::Value::Object(map) => NodeData::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
            serde_json::Value::Array(items) => {
                NodeData::Array(items.into_iter().map(Value::from_json).collect())
            }
            other => {
                return Err(WrapError::NotComposite {
                    kind: Value::from_json(other).kind(),
                });
            }
        };
        Ok(Self::from_data(data, parent))
    }

    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.inner.key
    }

    /// Whether both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(&*self.inner.data.borrow(), NodeData::Array(_))
    }

    /// The node holding this one as a property, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<ObservableNode> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Self { inner })
    }

    fn is_self_or_ancestor_of(&self, node: &ObservableNode) -> bool {
        let mut cursor = Some(node.clone());
        while let Some(current) = cursor {
            if current.ptr_eq(self) {
                return true;
            }
            cursor = current.parent();
        }
        false
    }

    /// Number of properties (object) or elements (array), private keys excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.inner.data.borrow() {
            NodeData::Object(map) => map.keys().filter(|k| !is_private_key(k)).count(),
            NodeData::Array(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Public keys in order: sorted names for objects, indices for arrays.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match &*self.inner.data.borrow() {
            NodeData::Object(map) => map
                .keys()
                .filter(|k| !is_private_key(k))
                .cloned()
                .collect(),
            NodeData::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        match &*self.inner.data.borrow() {
            NodeData::Object(map) => map.contains_key(key),
            NodeData::Array(items) => key.parse::<usize>().is_ok_and(|i| i < items.len()),
        }
    }

    fn raw_slot(&self, key: &str) -> Option<Value> {
        match &*self.inner.data.borrow() {
            NodeData::Object(map) => map.get(key).cloned(),
            NodeData::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        }
    }

    /// Store without wrapping or propagation. Returns `false` for a
    /// non-index key on an array, or an index more than
    /// [`MAX_ARRAY_GAP`] past the end.
    fn store(&self, key: &str, value: Value) -> bool {
        match &mut *self.inner.data.borrow_mut() {
            NodeData::Object(map) => {
                map.insert(key.to_owned(), value);
                true
            }
            NodeData::Array(items) => {
                let Ok(i) = key.parse::<usize>() else {
                    return false;
                };
                if i >= items.len() {
                    let Some(len) = i
                        .checked_add(1)
                        .filter(|len| len - items.len() <= MAX_ARRAY_GAP)
                    else {
                        return false;
                    };
                    items.resize(len, Value::Null);
                }
                items[i] = value;
                true
            }
        }
    }

    /// Read a property. Missing keys read as `Null`.
    ///
    /// A raw object or array is wrapped with this node as parent and stored
    /// back, so repeated reads return the same handle.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        let Some(value) = self.raw_slot(key) else {
            return Value::Null;
        };
        if is_private_key(key) {
            return value;
        }
        match value {
            Value::Raw(json) => match Self::from_json(json, Some(self)) {
                Ok(child) => {
                    self.store(key, Value::Node(child.clone()));
                    Value::Node(child)
                }
                Err(_) => Value::Null,
            },
            other => other,
        }
    }

    /// Read a dotted path such as `"grid.num_x"`. Any missing or scalar
    /// intermediate yields `Null`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Value {
        let mut current = Value::Node(self.clone());
        for segment in path.split('.') {
            current = match current {
                Value::Node(node) => node.get(segment),
                _ => return Value::Null,
            };
        }
        current
    }

    /// Write a property and propagate the change.
    ///
    /// Returns whether the assignment happened; array nodes reject
    /// non-index keys.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if is_private_key(key) {
            return self.store(key, value);
        }
        if self.is_array() && key.parse::<usize>().is_err() {
            return false;
        }

        let (value, value_node) = match value {
            Value::Raw(json) => match Self::from_json(json, Some(self)) {
                Ok(node) => (Value::Node(node.clone()), Some(node)),
                Err(_) => (Value::Null, None),
            },
            Value::Node(node) => {
                // Adopt an orphan unless that would create a cycle.
                if node.parent().is_none() && !node.is_self_or_ancestor_of(self) {
                    *node.inner.parent.borrow_mut() = Some(Rc::downgrade(&self.inner));
                }
                (Value::Node(node.clone()), Some(node))
            }
            other => (other, None),
        };

        if let (Some(new_node), Some(Value::Node(old_node))) = (&value_node, self.raw_slot(key)) {
            if !old_node.ptr_eq(new_node) {
                let inherited = old_node.callbacks_snapshot();
                new_node.inner.callbacks.borrow_mut().extend(inherited);
            }
        }

        if !self.store(key, value.clone()) {
            return false;
        }

        let change = Change {
            property: key.to_owned(),
            value,
            target: self.clone(),
        };
        propagation::propagate(&change, value_node.as_ref());
        true
    }

    /// Append to an array node. Returns `false` on object nodes.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        if !self.is_array() {
            return false;
        }
        let index = self.len().to_string();
        self.set(&index, value)
    }

    /// Append a change subscriber. There is no removal.
    pub fn on_change(&self, callback: impl Fn(&Change) + 'static) {
        self.inner.callbacks.borrow_mut().push(Rc::new(callback));
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    pub(crate) fn callbacks_snapshot(&self) -> Vec<ChangeCallback> {
        self.inner.callbacks.borrow().clone()
    }

    /// Deep, wrapper-free snapshot.
    ///
    /// Private keys and callables are omitted from objects; arrays are copied
    /// element-wise (a callable element becomes `null`).
    #[must_use]
    pub fn copy_raw(&self) -> serde_json::Value {
        let entries: Vec<(String, Value)> = match &*self.inner.data.borrow() {
            NodeData::Object(map) => map
                .iter()
                .filter(|(k, v)| !is_private_key(k) && !matches!(v, Value::Callable(_)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            NodeData::Array(items) => {
                let items: Vec<Value> = items.clone();
                return serde_json::Value::Array(items.iter().map(Value::to_json).collect());
            }
        };
        serde_json::Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, v.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    fn root(json: serde_json::Value) -> ObservableNode {
        ObservableNode::from_json(json, None).unwrap()
    }

    #[test]
    fn wrap_is_idempotent() {
        let node = root(json!({"a": 1}));
        let again = ObservableNode::wrap(Value::Node(node.clone()), None).unwrap();
        assert!(again.ptr_eq(&node));
    }

    #[test]
    fn wrap_rejects_scalars() {
        assert_eq!(
            ObservableNode::wrap(Value::from(3), None).unwrap_err(),
            WrapError::NotComposite { kind: "number" }
        );
    }

    #[test]
    fn reads_memoize_wrappers() {
        let node = root(json!({"grid": {"num_x": 2}}));
        let first = node.get("grid");
        let second = node.get("grid");
        let (Value::Node(a), Value::Node(b)) = (&first, &second) else {
            panic!("expected nodes");
        };
        assert!(a.ptr_eq(b));
        assert!(a.parent().unwrap().ptr_eq(&node));
    }

    #[test]
    fn missing_key_reads_null() {
        assert!(root(json!({})).get("nope").is_null());
    }

    #[test]
    fn private_keys_bypass_wrapping_and_propagation() {
        let node = root(json!({"_meta": {"x": 1}}));
        assert!(matches!(node.get("_meta"), Value::Raw(_)));

        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        node.on_change(move |_| f.set(f.get() + 1));
        assert!(node.set("_running", true));
        assert_eq!(fired.get(), 0);
        assert_eq!(node.copy_raw(), json!({}));
    }

    #[test]
    fn write_wraps_with_parent() {
        let node = root(json!({}));
        node.set("grid", json!({"num_x": 1}));
        let grid = node.get("grid");
        let grid = grid.as_node().unwrap();
        assert!(grid.parent().unwrap().ptr_eq(&node));
    }

    #[test]
    fn subscribers_survive_replacement() {
        let node = root(json!({"a": {"x": 0}}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        node.get("a")
            .as_node()
            .unwrap()
            .on_change(move |c| s.borrow_mut().push(c.property.clone()));

        node.set("a", json!({"x": 1}));
        node.get("a").as_node().unwrap().set("x", 2);
        assert_eq!(*seen.borrow(), vec!["a".to_owned(), "x".to_owned()]);
    }

    #[test]
    fn self_assignment_does_not_duplicate_subscribers() {
        let node = root(json!({"a": {}}));
        let a = node.get("a").as_node().unwrap().clone();
        a.on_change(|_| {});
        node.set("a", a.clone());
        assert_eq!(a.subscriber_count(), 1);
    }

    #[test]
    fn orphan_is_adopted_on_write() {
        let node = root(json!({}));
        let child = ObservableNode::object();
        node.set("child", child.clone());
        assert!(child.parent().unwrap().ptr_eq(&node));
    }

    #[test]
    fn cyclic_adoption_is_refused() {
        let node = root(json!({}));
        node.set("me", node.clone());
        assert!(node.parent().is_none());
    }

    #[test]
    fn array_rejects_named_keys() {
        let arr = ObservableNode::array();
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        arr.on_change(move |_| f.set(f.get() + 1));
        assert!(!arr.set("name", 1));
        assert_eq!(fired.get(), 0);
        assert!(arr.push(1));
        assert!(arr.push(json!({"w": 2})));
        assert_eq!(arr.len(), 2);
        assert_eq!(fired.get(), 2);
        assert_eq!(arr.copy_raw(), json!([1, {"w": 2}]));
    }

    #[test]
    fn array_rejects_indices_far_past_the_end() {
        let arr = ObservableNode::array();
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        arr.on_change(move |_| f.set(f.get() + 1));

        assert!(!arr.set("18446744073709551615", 1));
        assert!(!arr.set("1000000000", 1));
        assert!(!arr.set(&(MAX_ARRAY_GAP + 1).to_string(), 1));
        assert_eq!(arr.len(), 0);
        assert_eq!(fired.get(), 0);

        assert!(arr.set(&MAX_ARRAY_GAP.to_string(), true));
        assert_eq!(arr.len(), MAX_ARRAY_GAP + 1);
        assert!(arr.get("0").is_null());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn get_path_walks_nodes() {
        let node = root(json!({"a": {"b": {"c": 7}}}));
        assert_eq!(node.get_path("a.b.c").as_f64(), Some(7.0));
        assert!(node.get_path("a.x.c").is_null());
    }

    #[test]
    fn copy_raw_skips_callables() {
        let node = root(json!({"keep": 1}));
        node.set("f", super::super::value::Callable::new(|v| v.clone()));
        assert_eq!(node.copy_raw(), json!({"keep": 1}));
    }
}
