#![forbid(unsafe_code)]

//! Tab containers.
//!
//! A `.tab-container` element's content children become tab bodies. A header
//! bar is prepended with one `.tab-header` per body, labelled from the
//! body's `tab-name` attribute. The first tab starts selected; every other
//! body carries `.inactive`. Clicking a header swaps the classes.
//!
//! `style`, `script`, `noscript`, and `template` children are not tabs.

use std::rc::Rc;

use pwire_core::{Document, NodeId};
use pwire_runtime::Registry;
use tracing::debug;

pub const TAB_CONTAINER_CLASS: &str = "tab-container";
pub const HEADER_BAR_CLASS: &str = "tab-header-container";
pub const HEADER_CLASS: &str = "tab-header";
pub const SELECTED_CLASS: &str = "selected";
pub const INACTIVE_CLASS: &str = "inactive";
pub const TAB_NAME_ATTRIBUTE: &str = "tab-name";

const NON_TAB_TAGS: [&str; 4] = ["style", "script", "noscript", "template"];

/// One initialised tab container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabContainer {
    pub container: NodeId,
    pub header_bar: NodeId,
    /// Headers and bodies, index-aligned.
    pub headers: Vec<NodeId>,
    pub bodies: Vec<NodeId>,
}

impl TabContainer {
    /// Select tab `index`. Returns `false` for an out-of-range index.
    pub fn select(&self, doc: &Document, index: usize) -> bool {
        if index >= self.bodies.len() {
            return false;
        }
        for (i, (&header, &body)) in self.headers.iter().zip(&self.bodies).enumerate() {
            if i == index {
                doc.add_class(header, SELECTED_CLASS);
                doc.remove_class(body, INACTIVE_CLASS);
            } else {
                doc.remove_class(header, SELECTED_CLASS);
                doc.add_class(body, INACTIVE_CLASS);
            }
        }
        true
    }

    /// Index of the selected tab.
    #[must_use]
    pub fn selected(&self, doc: &Document) -> Option<usize> {
        self.headers
            .iter()
            .position(|&h| doc.has_class(h, SELECTED_CLASS))
    }
}

/// Build the header bar for `container`. Returns `None` when it has no tab
/// bodies.
pub fn init_tab_container(registry: &Registry, container: NodeId) -> Option<TabContainer> {
    let doc = registry.document();
    let bodies: Vec<NodeId> = doc
        .element_children(container)
        .into_iter()
        .filter(|&child| {
            doc.tag(child)
                .is_some_and(|tag| !NON_TAB_TAGS.contains(&tag.as_str()))
        })
        .collect();
    if bodies.is_empty() {
        debug!(container = %container, "tab container without tabs skipped");
        return None;
    }

    let header_bar = doc.create_element("div");
    doc.add_class(header_bar, HEADER_BAR_CLASS);
    let headers: Vec<NodeId> = bodies
        .iter()
        .map(|&body| {
            let header = doc.create_element("div");
            doc.add_class(header, HEADER_CLASS);
            let label = doc.attribute(body, TAB_NAME_ATTRIBUTE).unwrap_or_default();
            doc.set_text_content(header, &label);
            doc.append_child(header_bar, header);
            header
        })
        .collect();
    doc.prepend_child(container, header_bar);

    let tabs = Rc::new(TabContainer {
        container,
        header_bar,
        headers,
        bodies,
    });
    for (index, &header) in tabs.headers.iter().enumerate() {
        let weak = registry.downgrade();
        let tabs = Rc::clone(&tabs);
        doc.add_event_listener(header, "click", move |_| {
            if let Some(registry) = weak.upgrade() {
                tabs.select(registry.document(), index);
            }
        });
    }
    tabs.select(doc, 0);
    debug!(container = %container, tabs = tabs.bodies.len(), "tab container ready");
    Some(TabContainer::clone(&tabs))
}

/// Initialise every `.tab-container` in the document.
pub fn init_tab_containers(registry: &Registry) -> Vec<TabContainer> {
    let doc = registry.document();
    doc.elements_with_class(doc.root(), TAB_CONTAINER_CLASS)
        .into_iter()
        .filter_map(|container| init_tab_container(registry, container))
        .collect()
}
