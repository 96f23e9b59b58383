#![forbid(unsafe_code)]

//! Pan/zoom image displays.
//!
//! Each `.dynamic-image-display` gets a `.dynamic-image-container` holding an
//! `img.dynamic-image` whose `src` comes from the display's own `src`
//! attribute. The image is positioned through three custom properties on
//! its style: `--left` and `--top` in pixels, and the unitless `--scale`.
//!
//! - Dragging with the primary button pans the image.
//! - Each wheel event zooms in (scroll up) or out by [`ZOOM_STEP`].
//! - The first time the image becomes visible it is fitted to
//!   [`FIT_MARGIN`] of the container and centred.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use pwire_core::{Event, EventDetail, IntersectionEntry, IntersectionObserver, NodeId};
use pwire_runtime::{Registry, WeakRegistry};
use tracing::{debug, trace};

pub const DISPLAY_CLASS: &str = "dynamic-image-display";
pub const CONTAINER_CLASS: &str = "dynamic-image-container";
pub const IMAGE_CLASS: &str = "dynamic-image";

/// Zoom factor per wheel event.
pub const ZOOM_STEP: f64 = 1.05;
/// Fraction of the container the fitted image occupies.
pub const FIT_MARGIN: f64 = 0.95;
/// Visible fraction that triggers the initial fit.
pub const FIT_THRESHOLD: f64 = 0.01;

#[derive(Debug)]
struct PanZoom {
    left: f64,
    top: f64,
    scale: f64,
    drag_origin: Option<(f64, f64)>,
    fit_observer: Option<IntersectionObserver>,
}

impl Default for PanZoom {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale: 1.0,
            drag_origin: None,
            fit_observer: None,
        }
    }
}

/// Handle to one initialised display.
#[derive(Debug, Clone)]
pub struct DynamicImage {
    pub display: NodeId,
    pub container: NodeId,
    pub image: NodeId,
    state: Rc<RefCell<PanZoom>>,
}

impl DynamicImage {
    /// Committed pan offset `(left, top)`.
    #[must_use]
    pub fn offset(&self) -> (f64, f64) {
        let state = self.state.borrow();
        (state.left, state.top)
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.state.borrow().scale
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.state.borrow().drag_origin.is_some()
    }
}

fn px(value: f64) -> String {
    format!("{value}px")
}

fn primary_pointer(event: &Event) -> Option<(f64, f64)> {
    match event.detail() {
        EventDetail::Pointer {
            client_x,
            client_y,
            button: 0,
        } => Some((*client_x, *client_y)),
        _ => None,
    }
}

struct Listener {
    weak: WeakRegistry,
    state: Rc<RefCell<PanZoom>>,
    image: NodeId,
}

impl Listener {
    fn place(&self, registry: &Registry, left: f64, top: f64) {
        let doc = registry.document();
        doc.set_style_property(self.image, "--left", &px(left));
        doc.set_style_property(self.image, "--top", &px(top));
    }

    fn press(&self, event: &Event) {
        event.prevent_default();
        let (Some(registry), Some(origin)) = (self.weak.upgrade(), primary_pointer(event)) else {
            return;
        };
        let (left, top) = {
            let mut state = self.state.borrow_mut();
            state.drag_origin = Some(origin);
            (state.left, state.top)
        };
        self.place(&registry, left, top);
    }

    fn drag(&self, event: &Event) {
        let (Some(registry), Some((x, y))) = (self.weak.upgrade(), event.client_position()) else {
            return;
        };
        let position = {
            let state = self.state.borrow();
            state
                .drag_origin
                .map(|(x0, y0)| (state.left + x - x0, state.top + y - y0))
        };
        if let Some((left, top)) = position {
            event.prevent_default();
            self.place(&registry, left, top);
        }
    }

    fn release(&self, event: &Event) {
        let Some((x, y)) = event.client_position() else {
            return;
        };
        let mut state = self.state.borrow_mut();
        if let Some((x0, y0)) = state.drag_origin.take() {
            event.prevent_default();
            state.left += x - x0;
            state.top += y - y0;
            trace!(left = state.left, top = state.top, "pan committed");
        }
    }

    fn zoom(&self, event: &Event) {
        event.prevent_default();
        let (Some(registry), Some(delta_y)) = (self.weak.upgrade(), event.wheel_delta_y()) else {
            return;
        };
        let scale = {
            let mut state = self.state.borrow_mut();
            if delta_y < 0.0 {
                state.scale *= ZOOM_STEP;
            } else {
                state.scale /= ZOOM_STEP;
            }
            state.scale
        };
        registry
            .document()
            .set_style_property(self.image, "--scale", &scale.to_string());
    }
}

fn fit(
    weak: &WeakRegistry,
    state: &Weak<RefCell<PanZoom>>,
    container: NodeId,
    entries: &[IntersectionEntry],
    observer: &IntersectionObserver,
) {
    let (Some(registry), Some(state)) = (weak.upgrade(), state.upgrade()) else {
        return;
    };
    for entry in entries.iter().filter(|e| e.is_intersecting) {
        observer.unobserve(entry.target);
        let window = registry.window();
        let (image_w, image_h) = window.element_size(entry.target);
        let (container_w, container_h) = window.element_size(container);
        if image_w <= 0.0 || image_h <= 0.0 {
            debug!(image = %entry.target, "image has no size; fit skipped");
            continue;
        }
        let scale = (container_h / image_h).min(container_w / image_w) * FIT_MARGIN;
        let left = (container_w - image_w) / 2.0;
        let top = (container_h - image_h) / 2.0;
        {
            let mut state = state.borrow_mut();
            state.scale = scale;
            state.left = left;
            state.top = top;
        }
        let doc = registry.document();
        doc.set_style_property(entry.target, "--scale", &scale.to_string());
        doc.set_style_property(entry.target, "--left", &px(left));
        doc.set_style_property(entry.target, "--top", &px(top));
        debug!(image = %entry.target, scale, left, top, "image fitted");
    }
}

/// Build the pan/zoom structure inside `display`.
pub fn init_dynamic_image(registry: &Registry, display: NodeId) -> DynamicImage {
    let doc = registry.document();
    let container = doc.create_element("div");
    doc.add_class(container, CONTAINER_CLASS);
    doc.append_child(display, container);

    let image = doc.create_element("img");
    doc.add_class(image, IMAGE_CLASS);
    if let Some(src) = doc.attribute(display, "src") {
        doc.set_attribute(image, "src", &src);
    }

    let state = Rc::new(RefCell::new(PanZoom::default()));
    let listener = Rc::new(Listener {
        weak: registry.downgrade(),
        state: Rc::clone(&state),
        image,
    });
    let handlers: [(&str, fn(&Listener, &Event)); 5] = [
        ("mousedown", Listener::press),
        ("mousemove", Listener::drag),
        ("mouseup", Listener::release),
        ("mouseleave", Listener::release),
        ("wheel", Listener::zoom),
    ];
    for (kind, handler) in handlers {
        let listener = Rc::clone(&listener);
        doc.add_event_listener(container, kind, move |event| handler(&listener, event));
    }

    let observer = registry.window().intersection_observer(FIT_THRESHOLD, {
        let weak = registry.downgrade();
        let state = Rc::downgrade(&state);
        move |entries, observer| fit(&weak, &state, container, entries, observer)
    });
    observer.observe(image);
    state.borrow_mut().fit_observer = Some(observer);

    doc.append_child(container, image);
    DynamicImage {
        display,
        container,
        image,
        state,
    }
}

/// Initialise every `.dynamic-image-display` in the document.
pub fn init_dynamic_images(registry: &Registry) -> Vec<DynamicImage> {
    let doc = registry.document();
    doc.elements_with_class(doc.root(), DISPLAY_CLASS)
        .into_iter()
        .map(|display| init_dynamic_image(registry, display))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pwire_core::{Document, Window};

    fn page() -> (Registry, DynamicImage) {
        let doc =
            Document::from_markup(r#"<div class="dynamic-image-display" src="map.png"></div>"#)
                .unwrap();
        let reg = Registry::with_defaults(Window::new(doc));
        let image = init_dynamic_images(&reg).remove(0);
        (reg, image)
    }

    fn style(reg: &Registry, node: NodeId, property: &str) -> Option<String> {
        reg.document().style_property(node, property)
    }

    #[test]
    fn builds_container_and_image() {
        let (reg, img) = page();
        let doc = reg.document();
        assert_eq!(doc.parent(img.container), Some(img.display));
        assert_eq!(doc.parent(img.image), Some(img.container));
        assert_eq!(doc.attribute(img.image, "src").as_deref(), Some("map.png"));
        assert!(doc.has_class(img.image, IMAGE_CLASS));
    }

    #[test]
    fn drag_pans_and_commits() {
        let (reg, img) = page();
        let window = reg.window();
        window.dispatch_event(img.container, &Event::pointer("mousedown", 10.0, 10.0));
        assert!(img.is_dragging());
        window.dispatch_event(img.image, &Event::pointer("mousemove", 15.0, 30.0));
        assert_eq!(style(&reg, img.image, "--left").as_deref(), Some("5px"));
        assert_eq!(style(&reg, img.image, "--top").as_deref(), Some("20px"));
        window.dispatch_event(img.container, &Event::pointer("mouseup", 20.0, 30.0));
        assert!(!img.is_dragging());
        assert_eq!(img.offset(), (10.0, 20.0));

        // Moves without a pressed button do nothing.
        window.dispatch_event(img.container, &Event::pointer("mousemove", 90.0, 90.0));
        assert_eq!(img.offset(), (10.0, 20.0));
    }

    #[test]
    fn wheel_zooms() {
        let (reg, img) = page();
        reg.window().dispatch_event(img.image, &Event::wheel(-1.0));
        assert!((img.scale() - ZOOM_STEP).abs() < 1e-12);
        reg.window().dispatch_event(img.image, &Event::wheel(1.0));
        reg.window().dispatch_event(img.image, &Event::wheel(1.0));
        assert!((img.scale() - 1.0 / ZOOM_STEP).abs() < 1e-12);
        assert!(style(&reg, img.image, "--scale").is_some());
    }

    #[test]
    fn fits_once_on_first_visibility() {
        let (reg, img) = page();
        let window = reg.window();
        window.set_element_size(img.container, 400.0, 300.0);
        window.set_element_size(img.image, 200.0, 100.0);
        window.set_intersection_ratio(img.image, 1.0);
        assert!((img.scale() - 1.9).abs() < 1e-9);
        assert_eq!(img.offset(), (100.0, 100.0));
        assert_eq!(style(&reg, img.image, "--left").as_deref(), Some("100px"));

        window.set_intersection_ratio(img.image, 0.0);
        window.set_element_size(img.container, 800.0, 600.0);
        window.set_intersection_ratio(img.image, 1.0);
        assert_eq!(img.offset(), (100.0, 100.0));
    }
}
