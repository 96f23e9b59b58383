#![forbid(unsafe_code)]

//! Named template fragments lifted out of processed markup.

use std::collections::BTreeMap;

use pwire_core::NodeId;

/// Name → detached content fragment.
///
/// Filled at the end of each processing pass; later passes overwrite
/// entries with the same name.
#[derive(Debug, Default, Clone)]
pub struct TemplateStore {
    fragments: BTreeMap<String, NodeId>,
}

impl TemplateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `fragment` under `name`, returning the previous fragment.
    pub fn insert(&mut self, name: impl Into<String>, fragment: NodeId) -> Option<NodeId> {
        self.fragments.insert(name.into(), fragment)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.fragments.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Stored names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.fragments.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
