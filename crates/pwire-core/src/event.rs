#![forbid(unsafe_code)]

//! Host events and listener identities.
//!
//! An [`Event`] is created by the host (or by runtime code that synthesizes
//! a notification, such as the numeric-input `change` event) and handed to
//! [`Document::dispatch_event`](crate::dom::Document::dispatch_event). The
//! dispatcher fills in `target` / `current_target` as it walks the
//! propagation path; listeners observe the event by shared reference and can
//! only flip the interior flags (`prevent_default`, `stop_propagation`).

use std::cell::Cell;
use std::fmt;

use crate::dom::NodeId;

/// Identity of an installed listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Modifier state carried by keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyModifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        meta: false,
        shift: false,
        alt: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };
}

/// Kind-specific payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventDetail {
    /// Plain notification (`click`, `input`, `change`, ...).
    #[default]
    None,
    /// Scroll-wheel gesture. Positive `delta_y` scrolls down.
    Wheel { delta_y: f64 },
    /// Keyboard event.
    Key {
        key: String,
        modifiers: KeyModifiers,
    },
    /// Pointer event in client coordinates.
    Pointer {
        client_x: f64,
        client_y: f64,
        button: u8,
    },
}

/// A dispatched host event.
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    bubbles: bool,
    cancelable: bool,
    detail: EventDetail,
    target: Cell<Option<NodeId>>,
    current_target: Cell<Option<NodeId>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    /// Create a non-bubbling, non-cancelable event of the given kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bubbles: false,
            cancelable: false,
            detail: EventDetail::None,
            target: Cell::new(None),
            current_target: Cell::new(None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// A bubbling `click`.
    #[must_use]
    pub fn click() -> Self {
        Self::new("click").with_bubbles(true).with_cancelable(true)
    }

    /// A bubbling `input` notification.
    #[must_use]
    pub fn input() -> Self {
        Self::new("input").with_bubbles(true)
    }

    /// A bubbling, cancelable wheel gesture.
    #[must_use]
    pub fn wheel(delta_y: f64) -> Self {
        Self::new("wheel")
            .with_bubbles(true)
            .with_cancelable(true)
            .with_detail(EventDetail::Wheel { delta_y })
    }

    /// A bubbling, cancelable `keydown`.
    #[must_use]
    pub fn key_down(key: impl Into<String>, modifiers: KeyModifiers) -> Self {
        Self::new("keydown")
            .with_bubbles(true)
            .with_cancelable(true)
            .with_detail(EventDetail::Key {
                key: key.into(),
                modifiers,
            })
    }

    /// A pointer event of the given kind (`mousedown`, `mousemove`, ...).
    ///
    /// `mouseenter` and `mouseleave` do not bubble; every other pointer kind
    /// does.
    #[must_use]
    pub fn pointer(kind: impl Into<String>, client_x: f64, client_y: f64) -> Self {
        let kind = kind.into();
        let bubbles = !matches!(kind.as_str(), "mouseenter" | "mouseleave");
        Self::new(kind)
            .with_bubbles(bubbles)
            .with_cancelable(bubbles)
            .with_detail(EventDetail::Pointer {
                client_x,
                client_y,
                button: 0,
            })
    }

    #[must_use]
    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    #[must_use]
    pub fn with_cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Event type name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    #[must_use]
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    #[must_use]
    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    /// Node the event was dispatched to. `None` before dispatch.
    #[must_use]
    pub fn target(&self) -> Option<NodeId> {
        self.target.get()
    }

    /// Node whose listener is currently running. `None` outside dispatch.
    #[must_use]
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target.get()
    }

    /// Wheel delta, if this is a wheel event.
    #[must_use]
    pub fn wheel_delta_y(&self) -> Option<f64> {
        match self.detail {
            EventDetail::Wheel { delta_y } => Some(delta_y),
            _ => None,
        }
    }

    /// Pointer position, if this is a pointer event.
    #[must_use]
    pub fn client_position(&self) -> Option<(f64, f64)> {
        match self.detail {
            EventDetail::Pointer {
                client_x, client_y, ..
            } => Some((client_x, client_y)),
            _ => None,
        }
    }

    /// Mark the default action as cancelled. Ignored for non-cancelable events.
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stop the event from reaching further nodes on its path.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub(crate) fn begin_dispatch(&self, target: NodeId) {
        self.target.set(Some(target));
        self.propagation_stopped.set(false);
    }

    pub(crate) fn set_current_target(&self, node: Option<NodeId>) {
        self.current_target.set(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prevent_default_requires_cancelable() {
        let plain = Event::new("custom");
        plain.prevent_default();
        assert!(!plain.default_prevented());

        let wheel = Event::wheel(1.0);
        wheel.prevent_default();
        assert!(wheel.default_prevented());
    }

    #[test]
    fn enter_and_leave_do_not_bubble() {
        assert!(!Event::pointer("mouseenter", 0.0, 0.0).bubbles());
        assert!(!Event::pointer("mouseleave", 0.0, 0.0).bubbles());
        assert!(Event::pointer("mousedown", 0.0, 0.0).bubbles());
    }

    #[test]
    fn detail_accessors() {
        assert_eq!(Event::wheel(-3.0).wheel_delta_y(), Some(-3.0));
        assert_eq!(Event::click().wheel_delta_y(), None);
        assert_eq!(
            Event::pointer("mousemove", 4.0, 5.0).client_position(),
            Some((4.0, 5.0))
        );
    }
}
