#![forbid(unsafe_code)]

//! Subtree scan that installs directive bindings.
//!
//! # Design
//!
//! One pass over a subtree runs in four stages:
//!
//! 1. **Directives**: every eligible element (the root first if requested,
//!    then marker-class descendants in document order) has its directives
//!    parsed and applied: `init` hooks run immediately, then the tooltip,
//!    `init-vis`, and `on-*` bindings are installed.
//! 2. **Numeric inputs**: every `<input type="number">` gets clamping and
//!    wheel adjustment.
//! 3. **Templates**: every `<template>` is detached and stored by name.
//!
//! Templates are stored last, so `init` hooks of the same pass cannot see
//! them while `init-vis` and event handlers can.
//!
//! # Failure Modes
//!
//! A directive that fails to resolve (unknown handler, bad `objchange`
//! path, missing tooltip source) is reported once through
//! [`Registry::report`] and skipped. Sibling directives on the same element
//! and later elements are unaffected.
//!
//! Callbacks stored in the document or in observable nodes hold the registry
//! weakly; once the registry is dropped they do nothing.

use pwire_core::{Document, NodeId};
use tracing::{debug, debug_span};

use super::grammar::{Binding, DirectiveSet, EventSpec, TooltipSource};
use crate::config::ResizeBinding;
use crate::error::DirectiveError;
use crate::namespace::{self, Subscription};
use crate::numeric_input;
use crate::registry::{ChangeRecord, Handler, Registry, Trigger, WeakRegistry};

/// Class added to a tooltip anchor.
pub const HAS_TOOLTIP_CLASS: &str = "has-tooltip";

/// Class added to an element whose markup became a tooltip body.
pub const PROCESSED_CLASS: &str = "processed";

/// Summary of one processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Eligible elements visited.
    pub elements: usize,
    /// Hooks run or bindings installed.
    pub bindings: usize,
    /// Numeric inputs augmented.
    pub numeric_inputs: usize,
    /// Template names stored, in document order.
    pub templates: Vec<String>,
    /// Failures reported, in the order they occurred.
    pub errors: Vec<DirectiveError>,
}

impl ProcessReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Pass<'a> {
    registry: &'a Registry,
    doc: Document,
    report: ProcessReport,
}

impl Pass<'_> {
    fn fail(&mut self, err: DirectiveError) {
        self.registry.report(&err);
        self.report.errors.push(err);
    }

    fn lookup(&mut self, name: &str) -> Option<Handler> {
        match self.registry.handler(name) {
            Ok(handler) => Some(handler),
            Err(err) => {
                self.fail(err.into());
                None
            }
        }
    }

    fn apply(&mut self, element: NodeId, set: DirectiveSet) {
        for name in &set.init {
            if let Some(handler) = self.lookup(name) {
                debug!(element = %element, handler = %name, "init");
                handler(self.registry, Trigger::Element(element));
                self.report.bindings += 1;
            }
        }

        if let Some(source) = &set.tooltip {
            self.apply_tooltip(element, source);
        }

        for name in &set.init_vis {
            if let Some(handler) = self.lookup(name) {
                debug!(element = %element, handler = %name, "init-vis registered");
                self.registry.add_init_vis(element, handler);
                self.report.bindings += 1;
            }
        }

        for binding in &set.bindings {
            if let Some(handler) = self.lookup(&binding.handler) {
                self.install(element, binding, handler);
            }
        }
    }

    fn apply_tooltip(&mut self, anchor: NodeId, source: &TooltipSource) {
        let source_el = match source {
            TooltipSource::Text(_) => None,
            TooltipSource::ElementRef(id) => match self.doc.element_by_id(id) {
                Some(el) => Some(el),
                None => {
                    self.fail(DirectiveError::TooltipSourceMissing { id: id.clone() });
                    return;
                }
            },
        };

        let registry = self.registry;
        let config = registry.config();
        let (Some(begin), Some(end)) = (
            self.lookup(&config.tooltip_begin_handler),
            self.lookup(&config.tooltip_end_handler),
        ) else {
            return;
        };

        // The source leaves the document only once the tooltip is certain.
        let body = match (source, source_el) {
            (_, Some(el)) => {
                let body = self.doc.inner_markup(el);
                self.doc.detach(el);
                self.doc.add_class(el, PROCESSED_CLASS);
                body
            }
            (TooltipSource::Text(text), None) => text.clone(),
            (TooltipSource::ElementRef(_), None) => return,
        };

        self.registry.set_tooltip_body(anchor, body);
        self.doc.add_class(anchor, HAS_TOOLTIP_CLASS);
        for (kind, handler) in [("mouseenter", begin), ("mouseleave", end)] {
            let weak = self.registry.downgrade();
            self.doc.add_event_listener(anchor, kind, move |event| {
                if let Some(registry) = weak.upgrade() {
                    handler(&registry, Trigger::Event(event));
                }
            });
        }
        debug!(element = %anchor, "tooltip installed");
        self.report.bindings += 1;
    }

    fn install(&mut self, element: NodeId, binding: &Binding, handler: Handler) {
        let weak = self.registry.downgrade();
        match &binding.event {
            EventSpec::Native(kind) => {
                self.doc.add_event_listener(element, kind, move |event| {
                    if let Some(registry) = weak.upgrade() {
                        handler(&registry, Trigger::Event(event));
                    }
                });
            }
            EventSpec::Resize => match self.registry.config().resize_binding {
                ResizeBinding::Window => {
                    self.registry.window().add_event_listener("resize", move |_| {
                        if let Some(registry) = weak.upgrade() {
                            handler(&registry, Trigger::Element(element));
                        }
                    });
                }
                ResizeBinding::Element => self.registry.add_element_resize(element, handler),
            },
            EventSpec::VisChange => self.registry.add_vis_change(element, handler),
            EventSpec::AttrChange(names) => {
                let names = names.clone();
                self.doc.watch_attributes(element, move |records| {
                    let Some(registry) = weak.upgrade() else {
                        return;
                    };
                    for record in records {
                        if record.changed() && names.contains(&record.attribute_name) {
                            handler(&registry, Trigger::Element(record.target));
                        }
                    }
                });
            }
            EventSpec::ObjChange(paths) => {
                for path in paths {
                    match namespace::resolve(self.registry, path) {
                        Ok(subscription) => {
                            let pending = subscription.is_pending();
                            subscribe(subscription, element, handler.clone(), weak.clone());
                            debug!(
                                element = %element,
                                path = %path,
                                handler = %binding.handler,
                                pending,
                                "objchange bound"
                            );
                            self.report.bindings += 1;
                        }
                        Err(err) => self.fail(err),
                    }
                }
                return;
            }
        }
        debug!(
            element = %element,
            event = ?binding.event,
            handler = %binding.handler,
            "binding installed"
        );
        self.report.bindings += 1;
    }
}

fn subscribe(
    subscription: Subscription,
    element: NodeId,
    handler: Handler,
    weak: WeakRegistry,
) {
    // Keep only the filter in the closure; capturing the node would make it
    // own itself through its own subscriber list.
    let filter = match &subscription {
        Subscription::Direct(_) => None,
        Subscription::Filtered { property, .. } => Some(property.clone()),
    };
    subscription.node().on_change(move |change| {
        if filter.as_ref().is_some_and(|p| *p != change.property) {
            return;
        }
        let Some(registry) = weak.upgrade() else {
            return;
        };
        let record = ChangeRecord {
            property: change.property.clone(),
            value: change.value.clone(),
            target: change.target.clone(),
            element,
        };
        handler(&registry, Trigger::Change(&record));
    });
}

/// Process `root`'s subtree. See the module docs for the stages.
pub fn process_subtree(registry: &Registry, root: NodeId, include_root: bool) -> ProcessReport {
    let span = debug_span!("process_subtree", root = %root, include_root);
    let _guard = span.enter();

    let mut pass = Pass {
        registry,
        doc: registry.document().clone(),
        report: ProcessReport::default(),
    };
    let config = registry.config();

    let mut eligible = Vec::new();
    if include_root && pass.doc.is_element(root) {
        eligible.push(root);
    }
    eligible.extend(pass.doc.elements_with_class(root, &config.marker_class));

    for element in eligible {
        let (set, errors) =
            DirectiveSet::from_attributes(&pass.doc.attributes(element), &config.namespace);
        pass.report.elements += 1;
        for err in errors {
            pass.fail(err);
        }
        pass.apply(element, set);
    }

    let mut inputs = Vec::new();
    if include_root {
        inputs.push(root);
    }
    inputs.extend(pass.doc.elements_by_tag(root, "input"));
    for input in inputs {
        if numeric_input::is_numeric_input(&pass.doc, input) {
            numeric_input::augment(registry, input);
            pass.report.numeric_inputs += 1;
        }
    }

    for template in pass.doc.elements_by_tag(root, "template") {
        pass.doc.detach(template);
        let (Some(name), Some(content)) = (
            pass.doc.attribute(template, "name"),
            pass.doc.template_content(template),
        ) else {
            debug!(element = %template, "unnamed template dropped");
            continue;
        };
        registry.store_template(&name, content);
        pass.report.templates.push(name);
    }

    debug!(
        elements = pass.report.elements,
        bindings = pass.report.bindings,
        errors = pass.report.errors.len(),
        "subtree processed"
    );
    pass.report
}
