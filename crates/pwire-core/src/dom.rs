#![forbid(unsafe_code)]

//! Arena-backed document tree with listeners and attribute watches.
//!
//! # Design
//!
//! [`Document`] is a cheap, cloneable handle to shared interior state
//! (`Rc<RefCell<..>>`). Nodes live in an append-only arena and are addressed
//! by [`NodeId`]; detaching a node only unlinks it, so ids held by listeners,
//! observers, or stores stay valid for the page lifetime.
//!
//! # Invariants
//!
//! 1. A node has at most one parent, and appears exactly once in that
//!    parent's child list.
//! 2. No borrow of the interior is held while a listener or watch callback
//!    runs; callbacks are snapshotted first. Callbacks may therefore freely
//!    mutate the document.
//! 3. `<template>` children live in a separate content fragment and are not
//!    reachable by descendant queries on the document.
//! 4. Attribute watches queue records on write and deliver them only at
//!    [`Document::deliver_mutations`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::event::{Event, ListenerId};
use crate::markup::{self, MarkupError};

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Element payload: tag, ordered attributes, form value, template content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    value: Option<String>,
    content: Option<NodeId>,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Fragment,
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Callback for attribute watches.
pub type MutationCallback = Rc<dyn Fn(&[MutationRecord])>;

/// Identity of an attribute watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

/// One attribute write observed by a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub attribute_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl MutationRecord {
    /// Whether the write actually changed the attribute value.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.old_value != self.new_value
    }
}

struct ListenerEntry {
    id: ListenerId,
    node: NodeId,
    kind: String,
    callback: Listener,
}

struct AttributeWatch {
    id: WatchId,
    target: NodeId,
    callback: MutationCallback,
    pending: Vec<MutationRecord>,
}

struct DocumentInner {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
    watches: Vec<AttributeWatch>,
    next_watch: u64,
}

impl DocumentInner {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index())
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.index())?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent.index()) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.nodes.get_mut(id.index()) {
            n.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).and_then(|n| n.parent) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    fn collect_descendants(&self, root: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(root) else {
            return;
        };
        for &child in &node.children {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    fn record_attribute(&mut self, target: NodeId, name: &str, old: Option<String>) {
        let new_value = self
            .element(target)
            .and_then(|el| attribute_of(el, name).map(str::to_owned));
        for watch in self.watches.iter_mut().filter(|w| w.target == target) {
            watch.pending.push(MutationRecord {
                target,
                attribute_name: name.to_owned(),
                old_value: old.clone(),
                new_value: new_value.clone(),
            });
        }
    }
}

fn attribute_of<'a>(el: &'a ElementData, name: &str) -> Option<&'a str> {
    el.attributes
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Shared handle to a document tree.
///
/// Cloning a `Document` creates a new handle to the **same** tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("listeners", &inner.listeners.len())
            .field("watches", &inner.watches.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a root and a `<body>` element.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = DocumentInner {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            listeners: Vec::new(),
            next_listener: 0,
            watches: Vec::new(),
            next_watch: 0,
        };
        let root = inner.push(NodeKind::Document);
        let body = inner.push(NodeKind::Element(ElementData {
            tag: "body".to_owned(),
            ..ElementData::default()
        }));
        inner.nodes[body.index()].parent = Some(root);
        inner.nodes[root.index()].children.push(body);
        inner.root = root;
        inner.body = body;
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Create a document whose body holds the parsed `markup`.
    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        let doc = Self::new();
        let body = doc.body();
        doc.set_inner_markup(body, markup)?;
        Ok(doc)
    }

    /// Whether two handles refer to the same document.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The document node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    /// The `<body>` element.
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    // -- Construction -------------------------------------------------------

    /// Create a detached element. Tag names are lower-cased.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let mut inner = self.inner.borrow_mut();
        let content = (tag == "template").then(|| inner.push(NodeKind::Fragment));
        inner.push(NodeKind::Element(ElementData {
            tag,
            content,
            ..ElementData::default()
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .push(NodeKind::Text(text.to_owned()))
    }

    /// Create an empty detached fragment.
    pub fn create_fragment(&self) -> NodeId {
        self.inner.borrow_mut().push(NodeKind::Fragment)
    }

    /// Deep-clone a node. The clone is detached and carries no listeners.
    pub fn clone_subtree(&self, id: NodeId) -> NodeId {
        let (kind, children) = {
            let inner = self.inner.borrow();
            match inner.node(id) {
                Some(n) => (n.kind.clone(), n.children.clone()),
                None => (NodeKind::Fragment, Vec::new()),
            }
        };
        let kind = match kind {
            NodeKind::Element(mut el) => {
                el.content = el.content.map(|c| self.clone_subtree(c));
                NodeKind::Element(el)
            }
            NodeKind::Document => NodeKind::Fragment,
            other => other,
        };
        let copy = self.inner.borrow_mut().push(kind);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // -- Tree structure -----------------------------------------------------

    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.inner.borrow().node(id).map(|n| n.kind.clone())
    }

    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.inner.borrow().element(id).is_some()
    }

    /// Lower-case tag name, for elements.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.inner.borrow().element(id).map(|el| el.tag.clone())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().node(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .node(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Child nodes that are elements.
    #[must_use]
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        inner
            .node(id)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|c| inner.element(*c).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.element_children(id).into_iter().next()
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if inner.is_ancestor_or_self(child, parent) {
            return;
        }
        inner.unlink(child);
        if let Some(p) = inner.nodes.get_mut(parent.index()) {
            p.children.push(child);
        }
        if let Some(c) = inner.nodes.get_mut(child.index()) {
            c.parent = Some(parent);
        }
    }

    /// Insert `child` as the first child of `parent`, detaching it first.
    pub fn prepend_child(&self, parent: NodeId, child: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if inner.is_ancestor_or_self(child, parent) {
            return;
        }
        inner.unlink(child);
        if let Some(p) = inner.nodes.get_mut(parent.index()) {
            p.children.insert(0, child);
        }
        if let Some(c) = inner.nodes.get_mut(child.index()) {
            c.parent = Some(parent);
        }
    }

    /// Unlink `id` from its parent. The node (and its subtree) stays valid.
    pub fn detach(&self, id: NodeId) {
        self.inner.borrow_mut().unlink(id);
    }

    /// Remove every child of `id`.
    pub fn clear_children(&self, id: NodeId) {
        for child in self.children(id) {
            self.detach(child);
        }
    }

    /// Whether `node` is `ancestor` or lies below it.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.borrow().is_ancestor_or_self(ancestor, node)
    }

    /// Whether `id` is attached to the document root.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        let root = self.root();
        self.contains(root, id)
    }

    /// All nodes below `root` in document order (excluding `root`).
    #[must_use]
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.inner.borrow().collect_descendants(root, &mut out);
        out
    }

    /// Descendant elements of `root` carrying `class`, in document order.
    #[must_use]
    pub fn elements_with_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    /// Descendant elements of `root` with the given tag, in document order.
    #[must_use]
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        let inner = self.inner.borrow();
        let mut all = Vec::new();
        inner.collect_descendants(root, &mut all);
        all.into_iter()
            .filter(|id| inner.element(*id).is_some_and(|el| el.tag == tag))
            .collect()
    }

    /// First connected element whose `id` attribute equals `id_value`.
    #[must_use]
    pub fn element_by_id(&self, id_value: &str) -> Option<NodeId> {
        let root = self.root();
        self.descendants(root)
            .into_iter()
            .find(|id| self.attribute(*id, "id").as_deref() == Some(id_value))
    }

    /// Content fragment of a `<template>` element.
    #[must_use]
    pub fn template_content(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().element(id).and_then(|el| el.content)
    }

    // -- Attributes ---------------------------------------------------------

    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let inner = self.inner.borrow();
        let el = inner.element(id)?;
        attribute_of(el, &name.to_ascii_lowercase()).map(str::to_owned)
    }

    #[must_use]
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Attributes of an element in source order.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .element(id)
            .map(|el| el.attributes.clone())
            .unwrap_or_default()
    }

    /// Set an attribute, queueing a record for any watch on the element.
    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let mut inner = self.inner.borrow_mut();
        let Some(el) = inner.element_mut(id) else {
            return;
        };
        let old = match el.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => Some(std::mem::replace(v, value.to_owned())),
            None => {
                el.attributes.push((name.clone(), value.to_owned()));
                None
            }
        };
        inner.record_attribute(id, &name, old);
    }

    /// Remove an attribute, queueing a record if it existed.
    pub fn remove_attribute(&self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let mut inner = self.inner.borrow_mut();
        let Some(el) = inner.element_mut(id) else {
            return;
        };
        let Some(pos) = el.attributes.iter().position(|(k, _)| *k == name) else {
            return;
        };
        let (_, old) = el.attributes.remove(pos);
        inner.record_attribute(id, &name, Some(old));
    }

    /// Whitespace-separated entries of the `class` attribute.
    #[must_use]
    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        let inner = self.inner.borrow();
        inner
            .element(id)
            .and_then(|el| attribute_of(el, "class"))
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, id: NodeId, class: &str) {
        if !self.is_element(id) || self.has_class(id, class) {
            return;
        }
        let mut classes = self.classes(id);
        classes.push(class.to_owned());
        self.set_attribute(id, "class", &classes.join(" "));
    }

    pub fn remove_class(&self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let classes: Vec<String> = self
            .classes(id)
            .into_iter()
            .filter(|c| c != class)
            .collect();
        self.set_attribute(id, "class", &classes.join(" "));
    }

    /// Read one declaration of the inline `style` attribute.
    #[must_use]
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attribute(id, "style")?;
        parse_style(&style)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    /// Set one declaration of the inline `style` attribute.
    pub fn set_style_property(&self, id: NodeId, property: &str, value: &str) {
        let mut decls = self
            .attribute(id, "style")
            .map(|s| parse_style(&s))
            .unwrap_or_default();
        match decls.iter_mut().find(|(k, _)| k == property) {
            Some((_, v)) => *v = value.to_owned(),
            None => decls.push((property.to_owned(), value.to_owned())),
        }
        let style = decls
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attribute(id, "style", &style);
    }

    // -- Form values and text -----------------------------------------------

    /// Current form value: the live value if set, else the `value` attribute.
    #[must_use]
    pub fn value(&self, id: NodeId) -> String {
        let inner = self.inner.borrow();
        inner
            .element(id)
            .and_then(|el| {
                el.value
                    .clone()
                    .or_else(|| attribute_of(el, "value").map(str::to_owned))
            })
            .unwrap_or_default()
    }

    /// Set the live form value. Does not touch the `value` attribute.
    pub fn set_value(&self, id: NodeId, value: &str) {
        if let Some(el) = self.inner.borrow_mut().element_mut(id) {
            el.value = Some(value.to_owned());
        }
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let inner = self.inner.borrow();
        if let Some(NodeKind::Text(t)) = inner.node(id).map(|n| &n.kind) {
            return t.clone();
        }
        let mut all = Vec::new();
        inner.collect_descendants(id, &mut all);
        all.into_iter()
            .filter_map(|n| match &inner.node(n)?.kind {
                NodeKind::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&self, id: NodeId, text: &str) {
        self.clear_children(id);
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
    }

    /// Serialized markup of the children of `id`.
    #[must_use]
    pub fn inner_markup(&self, id: NodeId) -> String {
        markup::serialize_children(self, id)
    }

    /// Serialized markup of `id` itself.
    #[must_use]
    pub fn outer_markup(&self, id: NodeId) -> String {
        markup::serialize_node(self, id)
    }

    /// Replace the children of `id` with the parsed `source`.
    pub fn set_inner_markup(&self, id: NodeId, source: &str) -> Result<(), MarkupError> {
        let fragment = markup::parse_fragment(self, source)?;
        self.clear_children(id);
        for child in self.children(fragment) {
            self.append_child(id, child);
        }
        Ok(())
    }

    // -- Events -------------------------------------------------------------

    /// Install a listener for `kind` events reaching `node`.
    pub fn add_event_listener(
        &self,
        node: NodeId,
        kind: &str,
        callback: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner.listeners.push(ListenerEntry {
            id,
            node,
            kind: kind.to_owned(),
            callback: Rc::new(callback),
        });
        id
    }

    /// Remove a listener. Returns whether it was installed.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|l| l.id != id);
        inner.listeners.len() != before
    }

    /// Number of listeners for `kind` on `node`.
    #[must_use]
    pub fn listener_count(&self, node: NodeId, kind: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.node == node && l.kind == kind)
            .count()
    }

    fn is_listener_live(&self, id: ListenerId) -> bool {
        self.inner.borrow().listeners.iter().any(|l| l.id == id)
    }

    /// Dispatch `event` to `target`, bubbling through ancestors if the event
    /// bubbles. Returns `false` if a listener cancelled the default action.
    pub fn dispatch_event(&self, target: NodeId, event: &Event) -> bool {
        event.begin_dispatch(target);
        let mut path = vec![target];
        if event.bubbles() {
            let mut cursor = self.parent(target);
            while let Some(node) = cursor {
                path.push(node);
                cursor = self.parent(node);
            }
        }

        for node in path {
            let snapshot: Vec<(ListenerId, Listener)> = self
                .inner
                .borrow()
                .listeners
                .iter()
                .filter(|l| l.node == node && l.kind == event.kind())
                .map(|l| (l.id, Rc::clone(&l.callback)))
                .collect();
            if snapshot.is_empty() {
                continue;
            }
            event.set_current_target(Some(node));
            for (id, callback) in snapshot {
                // Listeners removed by an earlier listener on this node must not run.
                if self.is_listener_live(id) {
                    callback(event);
                }
            }
            if event.propagation_stopped() {
                break;
            }
        }
        event.set_current_target(None);
        !event.default_prevented()
    }

    // -- Attribute watches --------------------------------------------------

    /// Watch attribute writes on `target`. Records are delivered at the next
    /// [`deliver_mutations`](Self::deliver_mutations).
    pub fn watch_attributes(
        &self,
        target: NodeId,
        callback: impl Fn(&[MutationRecord]) + 'static,
    ) -> WatchId {
        let mut inner = self.inner.borrow_mut();
        inner.next_watch += 1;
        let id = WatchId(inner.next_watch);
        inner.watches.push(AttributeWatch {
            id,
            target,
            callback: Rc::new(callback),
            pending: Vec::new(),
        });
        id
    }

    /// Stop a watch, dropping its undelivered records.
    pub fn unwatch(&self, id: WatchId) {
        self.inner.borrow_mut().watches.retain(|w| w.id != id);
    }

    #[must_use]
    pub fn has_pending_mutations(&self) -> bool {
        self.inner
            .borrow()
            .watches
            .iter()
            .any(|w| !w.pending.is_empty())
    }

    /// Deliver queued attribute records, one callback per watch.
    /// Returns the number of records delivered.
    pub fn deliver_mutations(&self) -> usize {
        let batches: Vec<(MutationCallback, Vec<MutationRecord>)> = {
            let mut inner = self.inner.borrow_mut();
            inner
                .watches
                .iter_mut()
                .filter(|w| !w.pending.is_empty())
                .map(|w| (Rc::clone(&w.callback), std::mem::take(&mut w.pending)))
                .collect()
        };
        let mut delivered = 0;
        for (callback, records) in batches {
            delivered += records.len();
            callback(&records);
        }
        delivered
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_owned(), v.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn new_document_has_body() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.body()).as_deref(), Some("body"));
        assert_eq!(doc.parent(doc.body()), Some(doc.root()));
    }

    #[test]
    fn append_moves_node() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let c = doc.create_element("span");
        doc.append_child(a, c);
        doc.append_child(b, c);
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), vec![c]);
        assert_eq!(doc.parent(c), Some(b));
    }

    #[test]
    fn append_refuses_cycles() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(a, b);
        doc.append_child(b, a);
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn class_helpers() {
        let doc = Document::new();
        let el = doc.create_element("div");
        doc.add_class(el, "data");
        doc.add_class(el, "data");
        doc.add_class(el, "wide");
        assert_eq!(doc.attribute(el, "class").as_deref(), Some("data wide"));
        doc.remove_class(el, "data");
        assert!(!doc.has_class(el, "data"));
        assert!(doc.has_class(el, "wide"));
    }

    #[test]
    fn style_properties_round_trip() {
        let doc = Document::new();
        let el = doc.create_element("div");
        doc.set_style_property(el, "--left", "10px");
        doc.set_style_property(el, "--scale", "2");
        doc.set_style_property(el, "--left", "12px");
        assert_eq!(doc.style_property(el, "--left").as_deref(), Some("12px"));
        assert_eq!(
            doc.attribute(el, "style").as_deref(),
            Some("--left: 12px; --scale: 2")
        );
    }

    #[test]
    fn value_falls_back_to_attribute() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, "value", "3");
        assert_eq!(doc.value(input), "3");
        doc.set_value(input, "4");
        assert_eq!(doc.value(input), "4");
        assert_eq!(doc.attribute(input, "value").as_deref(), Some("3"));
    }

    #[test]
    fn dispatch_bubbles_to_ancestors() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("button");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);

        let hits = Rc::new(RefCell::new(Vec::new()));
        let h = Rc::clone(&hits);
        doc.add_event_listener(outer, "click", move |ev| {
            h.borrow_mut().push((ev.target(), ev.current_target()));
        });

        doc.dispatch_event(inner, &Event::click());
        assert_eq!(*hits.borrow(), vec![(Some(inner), Some(outer))]);
    }

    #[test]
    fn non_bubbling_event_stays_on_target() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        doc.add_event_listener(outer, "mouseenter", move |_| c.set(c.get() + 1));
        doc.dispatch_event(inner, &Event::pointer("mouseenter", 0.0, 0.0));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn removed_listener_does_not_run_in_same_dispatch() {
        let doc = Document::new();
        let el = doc.create_element("div");
        let count = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(None));

        let doc2 = doc.clone();
        let second2 = Rc::clone(&second);
        doc.add_event_listener(el, "click", move |_| {
            if let Some(id) = second2.get() {
                doc2.remove_event_listener(id);
            }
        });
        let c = Rc::clone(&count);
        let id = doc.add_event_listener(el, "click", move |_| c.set(c.get() + 1));
        second.set(Some(id));

        doc.dispatch_event(el, &Event::click());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn attribute_watch_queues_until_delivery() {
        let doc = Document::new();
        let el = doc.create_element("img");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        doc.watch_attributes(el, move |records| {
            s.borrow_mut().extend(records.iter().cloned());
        });

        doc.set_attribute(el, "src", "a.png");
        assert!(seen.borrow().is_empty());
        assert!(doc.has_pending_mutations());

        assert_eq!(doc.deliver_mutations(), 1);
        let seen = seen.borrow();
        assert_eq!(seen[0].attribute_name, "src");
        assert_eq!(seen[0].old_value, None);
        assert_eq!(seen[0].new_value.as_deref(), Some("a.png"));
        assert!(seen[0].changed());
    }

    #[test]
    fn clone_subtree_is_deep_and_detached() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        doc.set_attribute(span, "title", "x");
        doc.append_child(div, span);
        doc.append_child(doc.body(), div);

        let copy = doc.clone_subtree(div);
        assert_eq!(doc.parent(copy), None);
        let copy_span = doc.first_element_child(copy).unwrap();
        assert_ne!(copy_span, span);
        assert_eq!(doc.attribute(copy_span, "title").as_deref(), Some("x"));
    }

    #[test]
    fn element_by_id_ignores_detached_nodes() {
        let doc = Document::new();
        let el = doc.create_element("div");
        doc.set_attribute(el, "id", "tip");
        assert_eq!(doc.element_by_id("tip"), None);
        doc.append_child(doc.body(), el);
        assert_eq!(doc.element_by_id("tip"), Some(el));
    }
}
