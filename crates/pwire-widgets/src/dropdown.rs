#![forbid(unsafe_code)]

//! `<select>` population from a flat entry list.

use pwire_core::{Document, NodeId};
use serde::Deserialize;

/// One selectable value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DropdownEntry {
    /// Written to the option's `value`.
    pub handle: String,
    /// Visible label.
    pub name: String,
    /// Optgroup label; empty or absent means uncategorised.
    #[serde(default)]
    pub category: Option<String>,
}

impl DropdownEntry {
    #[must_use]
    pub fn new(handle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: name.into(),
            category: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

fn option(doc: &Document, entry: &DropdownEntry) -> NodeId {
    let option = doc.create_element("option");
    doc.set_attribute(option, "value", &entry.handle);
    doc.set_text_content(option, &entry.name);
    option
}

/// Replace the children of `select` with options built from `entries`.
///
/// Categorised entries go into one `optgroup` per category, in the order
/// categories first appear; uncategorised entries follow as plain options.
pub fn create_dropdown(doc: &Document, select: NodeId, entries: &[DropdownEntry]) {
    doc.clear_children(select);

    let mut groups: Vec<(&str, Vec<&DropdownEntry>)> = Vec::new();
    let mut loose = Vec::new();
    for entry in entries {
        match entry.category.as_deref().filter(|c| !c.is_empty()) {
            None => loose.push(entry),
            Some(category) => match groups.iter_mut().find(|(name, _)| *name == category) {
                Some((_, members)) => members.push(entry),
                None => groups.push((category, vec![entry])),
            },
        }
    }

    for (category, members) in groups {
        let group = doc.create_element("optgroup");
        doc.set_attribute(group, "label", category);
        doc.append_child(select, group);
        for entry in members {
            doc.append_child(group, option(doc, entry));
        }
    }
    for entry in loose {
        doc.append_child(select, option(doc, entry));
    }
}
