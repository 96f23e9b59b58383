#![forbid(unsafe_code)]

//! Range clamping and wheel adjustment for `<input type="number">`.
//!
//! Typing: after every `input` event the value is clamped to `[min, max]`.
//! The field is rewritten only when clamping changed the value, so ordinary
//! keystrokes never disturb the caret.
//!
//! Wheel: unless `wheel-adjust` opts out, each wheel event moves the value
//! one `step` (default 1) against the scroll direction, clamps it, formats it
//! with the step's decimal count, and dispatches a `change` event on the
//! field.

use pwire_core::{Document, Event, NodeId};
use tracing::trace;

use crate::registry::Registry;

/// Attribute that disables (anything but `"true"`) wheel adjustment.
pub const WHEEL_ADJUST_ATTRIBUTE: &str = "wheel-adjust";

/// `min` / `max` / `step` of one input. Unparsable attributes are absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumericBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

impl NumericBounds {
    #[must_use]
    pub fn from_element(doc: &Document, input: NodeId) -> Self {
        let read = |name: &str| doc.attribute(input, name).and_then(|v| parse_float(&v));
        Self {
            min: read("min"),
            max: read("max"),
            step: read("step"),
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(min) = self.min {
            if value < min {
                value = min;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                value = max;
            }
        }
        value
    }

    /// Step used for wheel adjustment: declared, non-zero, else 1.
    #[must_use]
    pub fn wheel_step(&self) -> f64 {
        self.step.filter(|s| *s != 0.0).unwrap_or(1.0)
    }
}

/// Leading-number parse in the manner of a lenient float reader:
/// `"12px"` → 12, `" 3.5"` → 3.5, `"abc"` → `None`.
#[must_use]
pub fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    (1..=end)
        .rev()
        .filter(|i| text.is_char_boundary(*i))
        .find_map(|i| text[..i].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Decimal digits implied by a step: `0.05` → 2, `2` → 0.
#[must_use]
pub fn decimal_digits(step: f64) -> usize {
    let text = format_number(step);
    text.split_once('.').map_or(0, |(_, frac)| frac.len())
}

/// Shortest display form: integers without a fractional part.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    format!("{value}")
}

fn format_fixed(value: f64, digits: usize) -> String {
    let text = format!("{value:.digits$}");
    // Avoid "-0" / "-0.00".
    if text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        text.trim_start_matches('-').to_owned()
    } else {
        text
    }
}

/// The corrected text if `value` lies outside the bounds, else `None`.
#[must_use]
pub fn clamp_input(value: &str, bounds: &NumericBounds) -> Option<String> {
    let current = parse_float(value)?;
    let clamped = bounds.clamp(current);
    if clamped == current {
        return None;
    }
    Some(match bounds.step.filter(|s| *s != 0.0) {
        Some(step) => format_fixed(clamped, decimal_digits(step)),
        None => format_number(clamped),
    })
}

/// The new text after one wheel event, or `None` for a non-numeric value
/// or a zero delta.
#[must_use]
pub fn wheel_adjust(value: &str, delta_y: f64, bounds: &NumericBounds) -> Option<String> {
    let current = parse_float(value)?;
    let step = bounds.wheel_step();
    let next = if delta_y > 0.0 {
        current - step
    } else if delta_y < 0.0 {
        current + step
    } else {
        return None;
    };
    Some(format_fixed(bounds.clamp(next), decimal_digits(step)))
}

/// Whether wheel adjustment is enabled for `input`.
#[must_use]
pub fn wheel_enabled(doc: &Document, input: NodeId, default: bool) -> bool {
    match doc.attribute(input, WHEEL_ADJUST_ATTRIBUTE) {
        None => default,
        Some(flag) => flag == "true",
    }
}

/// Whether `node` is an `<input type="number">`.
#[must_use]
pub fn is_numeric_input(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).as_deref() == Some("input")
        && doc
            .attribute(node, "type")
            .is_some_and(|t| t.eq_ignore_ascii_case("number"))
}

/// Install the clamping and wheel listeners on `input`.
///
/// The listeners reach the document through a weak registry handle, so they
/// go quiet once the registry is dropped.
pub fn augment(registry: &Registry, input: NodeId) {
    let doc = registry.document();

    let weak = registry.downgrade();
    doc.add_event_listener(input, "input", move |_| {
        let Some(registry) = weak.upgrade() else {
            return;
        };
        let doc = registry.document();
        let bounds = NumericBounds::from_element(doc, input);
        if let Some(fixed) = clamp_input(&doc.value(input), &bounds) {
            trace!(element = %input, value = %fixed, "numeric input clamped");
            doc.set_value(input, &fixed);
        }
    });

    if !wheel_enabled(doc, input, registry.config().wheel_adjust_default) {
        return;
    }
    let weak = registry.downgrade();
    doc.add_event_listener(input, "wheel", move |event| {
        event.prevent_default();
        let (Some(registry), Some(delta_y)) = (weak.upgrade(), event.wheel_delta_y()) else {
            return;
        };
        let doc = registry.document();
        let bounds = NumericBounds::from_element(doc, input);
        let Some(next) = wheel_adjust(&doc.value(input), delta_y, &bounds) else {
            return;
        };
        trace!(element = %input, value = %next, "numeric input wheel step");
        doc.set_value(input, &next);
        let change = Event::new("change")
            .with_bubbles(event.bubbles())
            .with_cancelable(event.cancelable());
        doc.dispatch_event(input, &change);
    });
}
