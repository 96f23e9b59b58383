#![forbid(unsafe_code)]

//! Hover-intent tooltips.
//!
//! # Design
//!
//! Every anchor (an element carrying a `tooltip` directive) moves through
//! four states:
//!
//! ```text
//!            enter                 show delay
//!   Idle ───────────▶ PendingShow ───────────▶ Visible
//!    ▲                    │ leave                │ leave
//!    │◀───────────────────┘                      ▼
//!    │               hide delay             PendingHide
//!    └◀──────────────────────────────────────────┤
//!                         enter                  │
//!                Visible ◀───────────────────────┘
//! ```
//!
//! The tooltip element is cloned from the first element of the stored
//! template (default `tooltip`) on first show, filled with the anchor's body
//! markup, and reused afterwards.
//!
//! # Invariants
//!
//! 1. At most one show timer is pending across all anchors; entering a
//!    second anchor cancels the first anchor's pending show.
//! 2. At most one tooltip is attached to the document; showing one hides
//!    the previously visible one.
//! 3. Re-entering an anchor during its hide delay cancels the hide.
//!
//! # Failure Modes
//!
//! A missing or empty template is logged and alerted when the show timer
//! fires; the anchor returns to `Idle` and the next hover retries.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use pwire_core::{NodeId, TimerId};
use pwire_runtime::{Registry, WeakRegistry};
use serde::Deserialize;
use tracing::{debug, error, trace};

use crate::error::WidgetError;

/// Default show and hide delay.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Default name of the template tooltips are cloned from.
pub const DEFAULT_TEMPLATE: &str = "tooltip";

/// Tooltip timing and template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TooltipConfig {
    pub show_delay_ms: u64,
    pub hide_delay_ms: u64,
    pub template: String,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        Self {
            show_delay_ms: 500,
            hide_delay_ms: 500,
            template: DEFAULT_TEMPLATE.to_owned(),
        }
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl TooltipConfig {
    #[must_use]
    pub fn show_delay(&self) -> Duration {
        Duration::from_millis(self.show_delay_ms)
    }

    #[must_use]
    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    #[must_use]
    pub fn with_show_delay(mut self, delay: Duration) -> Self {
        self.show_delay_ms = millis(delay);
        self
    }

    #[must_use]
    pub fn with_hide_delay(mut self, delay: Duration) -> Self {
        self.hide_delay_ms = millis(delay);
        self
    }

    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = name.into();
        self
    }
}

/// Hover state of one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    PendingShow,
    Visible,
    PendingHide,
}

#[derive(Debug, Default)]
struct AnchorState {
    state: HoverState,
    tooltip: Option<NodeId>,
    hide_timer: Option<TimerId>,
}

#[derive(Debug)]
struct ControllerInner {
    config: TooltipConfig,
    anchors: HashMap<NodeId, AnchorState>,
    show_timer: Option<(NodeId, TimerId)>,
    active: Option<NodeId>,
}

impl ControllerInner {
    fn anchor(&mut self, anchor: NodeId) -> &mut AnchorState {
        self.anchors.entry(anchor).or_default()
    }
}

/// Shared tooltip state machine.
///
/// Cloning creates a new handle to the **same** controller.
#[derive(Debug, Clone)]
pub struct TooltipController {
    inner: Rc<RefCell<ControllerInner>>,
}

impl TooltipController {
    #[must_use]
    pub fn new(config: TooltipConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ControllerInner {
                config,
                anchors: HashMap::new(),
                show_timer: None,
                active: None,
            })),
        }
    }

    /// Register the begin/end handlers under the names the registry's
    /// directive processor binds to tooltip anchors.
    pub fn install(&self, registry: &Registry) {
        let config = registry.config();
        let begin = self.clone();
        registry.register_handler(config.tooltip_begin_handler.clone(), move |reg, trigger| {
            if let Some(anchor) = trigger.element() {
                begin.begin(reg, anchor);
            }
        });
        let end = self.clone();
        registry.register_handler(config.tooltip_end_handler.clone(), move |reg, trigger| {
            if let Some(anchor) = trigger.element() {
                end.end(reg, anchor);
            }
        });
    }

    #[must_use]
    pub fn config(&self) -> TooltipConfig {
        self.inner.borrow().config.clone()
    }

    #[must_use]
    pub fn state(&self, anchor: NodeId) -> HoverState {
        self.inner
            .borrow()
            .anchors
            .get(&anchor)
            .map_or(HoverState::Idle, |a| a.state)
    }

    /// Anchor whose tooltip is currently attached.
    #[must_use]
    pub fn active_anchor(&self) -> Option<NodeId> {
        self.inner.borrow().active
    }

    /// Tooltip element built for `anchor`, once shown at least once.
    #[must_use]
    pub fn tooltip_element(&self, anchor: NodeId) -> Option<NodeId> {
        self.inner
            .borrow()
            .anchors
            .get(&anchor)
            .and_then(|a| a.tooltip)
    }

    /// Pointer entered `anchor`.
    pub fn begin(&self, registry: &Registry, anchor: NodeId) {
        let window = registry.window();
        match self.state(anchor) {
            HoverState::Visible | HoverState::PendingShow => {}
            HoverState::PendingHide => {
                let timer = {
                    let mut inner = self.inner.borrow_mut();
                    let a = inner.anchor(anchor);
                    a.state = HoverState::Visible;
                    a.hide_timer.take()
                };
                if let Some(timer) = timer {
                    window.clear_timeout(timer);
                }
                trace!(anchor = %anchor, "tooltip hide cancelled");
            }
            HoverState::Idle => {
                let (previous, delay) = {
                    let mut inner = self.inner.borrow_mut();
                    (inner.show_timer.take(), inner.config.show_delay())
                };
                if let Some((other, timer)) = previous {
                    window.clear_timeout(timer);
                    self.inner.borrow_mut().anchor(other).state = HoverState::Idle;
                }
                let weak = Rc::downgrade(&self.inner);
                let weak_registry = registry.downgrade();
                let timer = window.set_timeout(delay, move || {
                    show_from_timer(&weak, &weak_registry, anchor);
                });
                let mut inner = self.inner.borrow_mut();
                inner.show_timer = Some((anchor, timer));
                inner.anchor(anchor).state = HoverState::PendingShow;
                trace!(anchor = %anchor, "tooltip show pending");
            }
        }
    }

    /// Pointer left `anchor`.
    pub fn end(&self, registry: &Registry, anchor: NodeId) {
        let window = registry.window();
        match self.state(anchor) {
            HoverState::PendingShow => {
                let timer = {
                    let mut inner = self.inner.borrow_mut();
                    inner.anchor(anchor).state = HoverState::Idle;
                    match inner.show_timer {
                        Some((owner, timer)) if owner == anchor => {
                            inner.show_timer = None;
                            Some(timer)
                        }
                        _ => None,
                    }
                };
                if let Some(timer) = timer {
                    window.clear_timeout(timer);
                }
                trace!(anchor = %anchor, "tooltip show cancelled");
            }
            HoverState::Visible => {
                let weak = Rc::downgrade(&self.inner);
                let weak_registry = registry.downgrade();
                let delay = self.inner.borrow().config.hide_delay();
                let timer = window.set_timeout(delay, move || {
                    if let (Some(inner), Some(registry)) = (weak.upgrade(), weak_registry.upgrade())
                    {
                        TooltipController { inner }.hide(&registry, anchor);
                    }
                });
                let mut inner = self.inner.borrow_mut();
                let a = inner.anchor(anchor);
                a.state = HoverState::PendingHide;
                a.hide_timer = Some(timer);
                trace!(anchor = %anchor, "tooltip hide pending");
            }
            HoverState::Idle | HoverState::PendingHide => {}
        }
    }

    /// Attach `anchor`'s tooltip now, hiding any other visible tooltip.
    pub fn show(&self, registry: &Registry, anchor: NodeId) -> Result<NodeId, WidgetError> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.show_timer.is_some_and(|(owner, _)| owner == anchor) {
                inner.show_timer = None;
            }
        }
        let tooltip = match self.tooltip_element(anchor) {
            Some(tooltip) => tooltip,
            None => match self.build(registry, anchor) {
                Ok(tooltip) => tooltip,
                Err(err) => {
                    self.inner.borrow_mut().anchor(anchor).state = HoverState::Idle;
                    return Err(err);
                }
            },
        };

        let doc = registry.document();
        doc.append_child(doc.body(), tooltip);
        let previous = {
            let mut inner = self.inner.borrow_mut();
            inner.anchor(anchor).state = HoverState::Visible;
            inner.active.replace(anchor)
        };
        if let Some(other) = previous.filter(|other| *other != anchor) {
            self.hide(registry, other);
        }
        debug!(anchor = %anchor, tooltip = %tooltip, "tooltip shown");
        Ok(tooltip)
    }

    /// Detach `anchor`'s tooltip and return it to `Idle`.
    pub fn hide(&self, registry: &Registry, anchor: NodeId) {
        let (timer, tooltip) = {
            let mut inner = self.inner.borrow_mut();
            if inner.active == Some(anchor) {
                inner.active = None;
            }
            let a = inner.anchor(anchor);
            a.state = HoverState::Idle;
            (a.hide_timer.take(), a.tooltip)
        };
        if let Some(timer) = timer {
            registry.window().clear_timeout(timer);
        }
        if let Some(tooltip) = tooltip {
            registry.document().detach(tooltip);
        }
        debug!(anchor = %anchor, "tooltip hidden");
    }

    fn build(&self, registry: &Registry, anchor: NodeId) -> Result<NodeId, WidgetError> {
        let name = self.inner.borrow().config.template.clone();
        let doc = registry.document();
        let fragment = registry.template(&name)?;
        let first = doc
            .first_element_child(fragment)
            .ok_or(WidgetError::EmptyTemplate { name })?;
        let tooltip = doc.clone_subtree(first);
        let body = registry.tooltip_body(anchor).unwrap_or_default();
        doc.set_inner_markup(tooltip, &body)?;
        self.inner.borrow_mut().anchor(anchor).tooltip = Some(tooltip);
        Ok(tooltip)
    }
}

fn show_from_timer(
    weak: &Weak<RefCell<ControllerInner>>,
    weak_registry: &WeakRegistry,
    anchor: NodeId,
) {
    let (Some(inner), Some(registry)) = (weak.upgrade(), weak_registry.upgrade()) else {
        return;
    };
    if let Err(err) = (TooltipController { inner }).show(&registry, anchor) {
        error!(anchor = %anchor, error = %err, "tooltip show failed");
        registry.window().alert(err.to_string());
    }
}
