#![forbid(unsafe_code)]

//! Shared log of handler invocations.

use std::cell::RefCell;
use std::rc::Rc;

use pwire_runtime::{Registry, Trigger};

/// One handler call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub handler: String,
    /// Element reported by the trigger, as its `id` attribute if it has one.
    pub element: Option<String>,
    /// `objchange` property and numeric value, when the trigger is a change.
    pub change: Option<(String, Option<f64>)>,
}

/// Cloneable recorder. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler named `name` that appends to this log.
    pub fn register(&self, registry: &Registry, name: &str) {
        let calls = Rc::clone(&self.calls);
        let handler = name.to_owned();
        registry.register_handler(name, move |registry, trigger| {
            let element = trigger
                .element()
                .and_then(|el| registry.document().attribute(el, "id"));
            let change = match trigger {
                Trigger::Change(record) => {
                    Some((record.property.clone(), record.value.as_f64()))
                }
                _ => None,
            };
            calls.borrow_mut().push(Call {
                handler: handler.clone(),
                element,
                change,
            });
        });
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Handler names in call order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.handler.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}
