#![forbid(unsafe_code)]

//! The page-wide registry: handlers, data fields, templates, and observers.
//!
//! # Design
//!
//! [`Registry`] is a cloneable handle (`Rc`) created once at startup and kept
//! for the page lifetime. Directives name handlers as strings; the registry
//! turns those names into typed [`Handler`]s or a [`RegistryError`].
//!
//! Handlers receive the registry itself plus a [`Trigger`] describing what
//! fired them:
//!
//! | Directive             | Trigger                  |
//! |-----------------------|--------------------------|
//! | `init`, `init-vis`    | `Element`                |
//! | `on-resize`           | `Element`                |
//! | `on-attrchange(..)`   | `Element`                |
//! | `on-vis-change`       | `Intersection`           |
//! | `on-objchange(..)`    | `Change`                 |
//! | any native event      | `Event`                  |
//!
//! The three observer singletons (first draw, visibility delta, element
//! resize) are created with the registry and call back into it through a
//! weak handle, so the registry never keeps itself alive.
//!
//! # Invariants
//!
//! 1. `init-vis` hooks of an element run at most once: the element is
//!    unobserved and its hooks are taken before any of them runs.
//! 2. `vis-change` hooks run only when the element's `_visible` attribute
//!    actually flips.
//! 3. No registry borrow is held while a handler runs.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use pwire_core::{
    Document, Event, IntersectionEntry, IntersectionObserver, NodeId, ResizeEntry,
    ResizeObserver, Window,
};
use tracing::{debug, error};

use crate::config::RuntimeConfig;
use crate::directive::{self, ProcessReport};
use crate::error::{ConfigError, DirectiveError, RegistryError};
use crate::reactive::{ObservableNode, Value};
use crate::template::TemplateStore;

/// Attribute mirroring the last reported visibility of an element.
pub const VISIBLE_ATTRIBUTE: &str = "_visible";

/// Field key that marks a JSON object for wrapping at definition time.
pub const OBSERVABLE_MARKER: &str = "_observable";

/// Record handed to `objchange` handlers.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub property: String,
    pub value: Value,
    /// Node that was written to.
    pub target: ObservableNode,
    /// Element carrying the directive.
    pub element: NodeId,
}

/// What fired a handler.
#[derive(Debug, Clone, Copy)]
pub enum Trigger<'a> {
    Element(NodeId),
    Event(&'a Event),
    Intersection(&'a IntersectionEntry),
    Change(&'a ChangeRecord),
}

impl Trigger<'_> {
    /// The element most closely associated with the trigger.
    #[must_use]
    pub fn element(&self) -> Option<NodeId> {
        match self {
            Self::Element(id) => Some(*id),
            Self::Event(event) => event.current_target().or_else(|| event.target()),
            Self::Intersection(entry) => Some(entry.target),
            Self::Change(record) => Some(record.element),
        }
    }

    #[must_use]
    pub fn event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    #[must_use]
    pub fn change(&self) -> Option<&ChangeRecord> {
        match self {
            Self::Change(record) => Some(record),
            _ => None,
        }
    }
}

/// A named handler.
pub type Handler = Rc<dyn Fn(&Registry, Trigger<'_>)>;

#[derive(Default)]
pub(crate) struct ElementHooks {
    init_vis: Vec<Handler>,
    vis_change: Vec<Handler>,
    resize: Vec<Handler>,
}

struct RegistryInner {
    config: RuntimeConfig,
    window: Window,
    handlers: RefCell<HashMap<String, Handler>>,
    fields: RefCell<BTreeMap<String, Value>>,
    templates: RefCell<TemplateStore>,
    globals: RefCell<BTreeMap<String, ObservableNode>>,
    hooks: RefCell<HashMap<NodeId, ElementHooks>>,
    tooltip_bodies: RefCell<HashMap<NodeId, String>>,
    first_draw: IntersectionObserver,
    delta_vis: IntersectionObserver,
    element_resize: ResizeObserver,
    init_done: Cell<bool>,
}

/// Shared handle to the registry.
///
/// Cloning creates a new handle to the **same** registry.
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

/// Non-owning registry handle for callbacks stored in the document.
#[derive(Clone)]
pub struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    #[must_use]
    pub fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(|inner| Registry { inner })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("namespace", &self.inner.config.namespace)
            .field("handlers", &self.inner.handlers.borrow().len())
            .field("fields", &self.inner.fields.borrow().len())
            .field("templates", &self.inner.templates.borrow().len())
            .field("init_done", &self.inner.init_done.get())
            .finish()
    }
}

impl Registry {
    /// Create a registry over `window` after validating `config`.
    pub fn new(window: Window, config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(window, config))
    }

    /// Create a registry with the default configuration.
    #[must_use]
    pub fn with_defaults(window: Window) -> Self {
        Self::build(window, RuntimeConfig::default())
    }

    fn build(window: Window, config: RuntimeConfig) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<RegistryInner>| {
            let w = WeakRegistry(weak.clone());
            let first_draw = window.intersection_observer(config.first_draw_threshold, {
                let w = w.clone();
                move |entries, observer| {
                    if let Some(registry) = w.upgrade() {
                        registry.on_first_draw(entries, observer);
                    }
                }
            });
            let delta_vis = window.intersection_observer(0.0, {
                let w = w.clone();
                move |entries, _| {
                    if let Some(registry) = w.upgrade() {
                        registry.on_visibility_delta(entries);
                    }
                }
            });
            let element_resize = window.resize_observer(move |entries, _| {
                if let Some(registry) = w.upgrade() {
                    registry.on_element_resize(entries);
                }
            });
            RegistryInner {
                config,
                window,
                handlers: RefCell::new(HashMap::new()),
                fields: RefCell::new(BTreeMap::new()),
                templates: RefCell::new(TemplateStore::new()),
                globals: RefCell::new(BTreeMap::new()),
                hooks: RefCell::new(HashMap::new()),
                tooltip_bodies: RefCell::new(HashMap::new()),
                first_draw,
                delta_vis,
                element_resize,
                init_done: Cell::new(false),
            }
        });
        Self { inner }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn window(&self) -> &Window {
        &self.inner.window
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        self.inner.window.document()
    }

    // -- Handlers -----------------------------------------------------------

    /// Register (or replace) a named handler.
    pub fn register_handler(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&Registry, Trigger<'_>) + 'static,
    ) {
        let name = name.into();
        debug!(handler = %name, "handler registered");
        self.inner
            .handlers
            .borrow_mut()
            .insert(name, Rc::new(handler));
    }

    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.inner.handlers.borrow().contains_key(name)
    }

    /// Look up a handler by name.
    pub fn handler(&self, name: &str) -> Result<Handler, RegistryError> {
        self.inner
            .handlers
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownHandler(name.to_owned()))
    }

    /// Look up and invoke a handler.
    pub fn call(&self, name: &str, trigger: Trigger<'_>) -> Result<(), RegistryError> {
        let handler = self.handler(name)?;
        handler(self, trigger);
        Ok(())
    }

    // -- Data fields --------------------------------------------------------

    /// Define a data field from JSON. An object carrying `_observable: true`
    /// is wrapped as an observable root. Returns the stored value.
    pub fn define_field(&self, name: impl Into<String>, json: serde_json::Value) -> Value {
        let marked = json
            .get(OBSERVABLE_MARKER)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let value = if marked {
            ObservableNode::from_json(json.clone(), None)
                .map_or_else(|_| Value::from_json(json), Value::Node)
        } else {
            Value::from_json(json)
        };
        self.set_field(name, value.clone());
        value
    }

    /// Store a field value as is.
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .fields
            .borrow_mut()
            .insert(name.into(), value.into());
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.inner.fields.borrow().get(name).cloned()
    }

    /// A field that must be an observable node.
    pub fn observable_field(&self, name: &str) -> Result<ObservableNode, RegistryError> {
        match self.field(name) {
            Some(Value::Node(node)) => Ok(node),
            Some(_) => Err(RegistryError::FieldNotObservable(name.to_owned())),
            None => Err(RegistryError::UnknownField(name.to_owned())),
        }
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// Register an observable root reachable as the first segment of an
    /// `objchange` path.
    pub fn register_global(&self, name: impl Into<String>, node: ObservableNode) {
        self.inner.globals.borrow_mut().insert(name.into(), node);
    }

    #[must_use]
    pub fn global(&self, name: &str) -> Option<ObservableNode> {
        self.inner.globals.borrow().get(name).cloned()
    }

    // -- Templates ----------------------------------------------------------

    /// Content fragment of a stored template.
    pub fn template(&self, name: &str) -> Result<NodeId, RegistryError> {
        self.inner
            .templates
            .borrow()
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTemplate(name.to_owned()))
    }

    #[must_use]
    pub fn template_names(&self) -> Vec<String> {
        self.inner.templates.borrow().names()
    }

    pub(crate) fn store_template(&self, name: &str, fragment: NodeId) {
        self.inner.templates.borrow_mut().insert(name, fragment);
    }

    // -- Tooltips -----------------------------------------------------------

    /// Resolved tooltip body markup for an anchor element.
    #[must_use]
    pub fn tooltip_body(&self, anchor: NodeId) -> Option<String> {
        self.inner.tooltip_bodies.borrow().get(&anchor).cloned()
    }

    pub(crate) fn set_tooltip_body(&self, anchor: NodeId, body: String) {
        self.inner.tooltip_bodies.borrow_mut().insert(anchor, body);
    }

    // -- Observers ----------------------------------------------------------

    /// One-shot visibility observer behind `init-vis`.
    #[must_use]
    pub fn first_draw_observer(&self) -> &IntersectionObserver {
        &self.inner.first_draw
    }

    /// Transition observer behind `on-vis-change`.
    #[must_use]
    pub fn delta_visibility_observer(&self) -> &IntersectionObserver {
        &self.inner.delta_vis
    }

    /// Element resize observer behind `on-resize` in element mode.
    #[must_use]
    pub fn element_resize_observer(&self) -> &ResizeObserver {
        &self.inner.element_resize
    }

    pub(crate) fn add_init_vis(&self, element: NodeId, handler: Handler) {
        self.inner
            .hooks
            .borrow_mut()
            .entry(element)
            .or_default()
            .init_vis
            .push(handler);
        self.inner.first_draw.observe(element);
    }

    pub(crate) fn add_vis_change(&self, element: NodeId, handler: Handler) {
        self.inner
            .hooks
            .borrow_mut()
            .entry(element)
            .or_default()
            .vis_change
            .push(handler);
        self.inner.delta_vis.observe(element);
    }

    pub(crate) fn add_element_resize(&self, element: NodeId, handler: Handler) {
        self.inner
            .hooks
            .borrow_mut()
            .entry(element)
            .or_default()
            .resize
            .push(handler);
        self.inner.element_resize.observe(element);
    }

    fn on_first_draw(&self, entries: &[IntersectionEntry], observer: &IntersectionObserver) {
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            observer.unobserve(entry.target);
            let hooks = self
                .inner
                .hooks
                .borrow_mut()
                .get_mut(&entry.target)
                .map(|h| std::mem::take(&mut h.init_vis))
                .unwrap_or_default();
            debug!(element = %entry.target, hooks = hooks.len(), "first draw");
            for hook in hooks {
                hook(self, Trigger::Element(entry.target));
            }
        }
    }

    fn on_visibility_delta(&self, entries: &[IntersectionEntry]) {
        let doc = self.document();
        for entry in entries {
            let was_visible =
                doc.attribute(entry.target, VISIBLE_ATTRIBUTE).as_deref() == Some("true");
            if entry.is_intersecting == was_visible {
                continue;
            }
            let flag = if entry.is_intersecting { "true" } else { "false" };
            doc.set_attribute(entry.target, VISIBLE_ATTRIBUTE, flag);
            let hooks = self
                .inner
                .hooks
                .borrow()
                .get(&entry.target)
                .map(|h| h.vis_change.clone())
                .unwrap_or_default();
            debug!(element = %entry.target, visible = entry.is_intersecting, "visibility changed");
            for hook in hooks {
                hook(self, Trigger::Intersection(entry));
            }
        }
    }

    fn on_element_resize(&self, entries: &[ResizeEntry]) {
        for entry in entries {
            let hooks = self
                .inner
                .hooks
                .borrow()
                .get(&entry.target)
                .map(|h| h.resize.clone())
                .unwrap_or_default();
            for hook in hooks {
                hook(self, Trigger::Element(entry.target));
            }
        }
    }

    // -- Processing ---------------------------------------------------------

    /// Surface a resolution failure: logged, then shown through the window's
    /// alert channel.
    pub fn report(&self, err: &DirectiveError) {
        error!(error = %err, "directive failed");
        self.inner.window.alert(err.to_string());
    }

    /// Process the whole document once, then flush the window.
    pub fn init(&self) -> ProcessReport {
        let root = self.document().root();
        let report = self.process_subtree(root, false);
        self.inner.init_done.set(true);
        self.inner.window.flush();
        report
    }

    /// Process `root`'s subtree (and `root` itself if `include_root`).
    pub fn process_subtree(&self, root: NodeId, include_root: bool) -> ProcessReport {
        directive::process_subtree(self, root, include_root)
    }

    #[must_use]
    pub fn init_done(&self) -> bool {
        self.inner.init_done.get()
    }
}
