//! End-to-end directive scans over parsed pages.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use pwire_core::Event;
use pwire_harness::{CallLog, PageFixture, init_test_logging};
use pwire_runtime::registry::VISIBLE_ATTRIBUTE;
use pwire_runtime::{DirectiveError, RegistryError, ResizeBinding, RuntimeConfig};
use serde_json::json;

#[test]
fn click_increments_once_per_click() {
    init_test_logging();
    let page = PageFixture::new(
        r#"<div class="data"><button id="go" class="data" p:on-click="increment">+</button></div>"#,
    )
    .unwrap();
    page.registry.define_field("count", json!(0));
    page.registry.register_handler("increment", |reg, _| {
        let n = reg.field("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
        reg.set_field("count", n + 1.0);
    });
    assert!(page.init().is_clean());

    assert!(page.click("go"));
    assert_eq!(page.registry.field("count").and_then(|v| v.as_f64()), Some(1.0));
    assert!(page.click("go"));
    assert_eq!(page.registry.field("count").and_then(|v| v.as_f64()), Some(2.0));
}

#[test]
fn handlers_fire_in_listed_order_for_each_event() {
    let page = PageFixture::new(
        r#"<input id="f" class="data" p:on-focus,blur="first, second">"#,
    )
    .unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "first");
    log.register(&page.registry, "second");
    let report = page.init();
    assert_eq!(report.bindings, 4);

    let field = page.element("f").unwrap();
    page.dispatch(field, &Event::new("focus"));
    assert_eq!(log.names(), vec!["first", "second"]);
    page.dispatch(field, &Event::new("blur"));
    assert_eq!(log.names(), vec!["first", "second", "first", "second"]);
}

#[test]
fn unmarked_elements_are_ignored() {
    let page = PageFixture::new(r#"<div id="x" p:init="seen"></div>"#).unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "seen");
    let report = page.init();
    assert_eq!(report.elements, 0);
    assert!(log.is_empty());
}

#[test]
fn unknown_handler_alerts_once_and_siblings_still_install() {
    let page = PageFixture::new(
        r#"<div id="a" class="data" p:init="ready" p:on-click="missing" p:on-dblclick="ready"></div>"#,
    )
    .unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "ready");
    let report = page.init();

    assert_eq!(
        report.errors,
        vec![DirectiveError::Registry(RegistryError::UnknownHandler(
            "missing".into()
        ))]
    );
    assert_eq!(
        page.take_alerts(),
        vec!["event function not found: missing".to_owned()]
    );
    let a = page.element("a").unwrap();
    page.dispatch(a, &Event::new("dblclick").with_bubbles(true));
    assert_eq!(log.names(), vec!["ready", "ready"]);
}

#[test]
fn init_vis_fires_once() {
    let page = PageFixture::new(r#"<div id="panel" class="data" p:init-vis="drawn"></div>"#).unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "drawn");
    page.init();
    assert!(log.is_empty());

    let panel = page.element("panel").unwrap();
    page.window.set_intersection_ratio(panel, 0.005);
    assert!(log.is_empty());
    page.window.set_intersection_ratio(panel, 0.5);
    assert_eq!(log.len(), 1);
    page.window.set_intersection_ratio(panel, 0.0);
    page.window.set_intersection_ratio(panel, 1.0);
    assert_eq!(log.len(), 1);
    assert!(!page.registry.first_draw_observer().is_observing(panel));
}

#[test]
fn vis_change_fires_on_every_transition() {
    let page = PageFixture::new(r#"<div id="p" class="data" p:on-vis-change="vis"></div>"#).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    page.registry.register_handler("vis", move |_, trigger| {
        if let pwire_runtime::Trigger::Intersection(entry) = trigger {
            sink.borrow_mut().push(entry.is_intersecting);
        }
    });
    page.init();
    let p = page.element("p").unwrap();

    page.window.set_intersection_ratio(p, 0.3);
    page.window.set_intersection_ratio(p, 0.8);
    page.window.set_intersection_ratio(p, 0.0);
    page.window.set_intersection_ratio(p, 1.0);
    assert_eq!(*seen.borrow(), vec![true, false, true]);
    assert_eq!(
        page.document().attribute(p, VISIBLE_ATTRIBUTE).as_deref(),
        Some("true")
    );
}

#[test]
fn attrchange_watches_listed_attributes() {
    let page = PageFixture::new(
        r#"<img id="pic" class="data" src="a.png" p:on-attrchange(src,srcset)="reload">"#,
    )
    .unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "reload");
    page.init();
    let doc = page.document();
    let pic = page.element("pic").unwrap();

    doc.set_attribute(pic, "src", "b.png");
    doc.set_attribute(pic, "alt", "ignored");
    page.window.flush();
    doc.set_attribute(pic, "srcset", "b@2x.png 2x");
    page.window.flush();
    doc.set_attribute(pic, "src", "b.png");
    page.window.flush();
    assert_eq!(log.len(), 2);
    assert_eq!(log.calls()[0].element.as_deref(), Some("pic"));
}

#[test]
fn window_resize_binding() {
    let page = PageFixture::new(r#"<canvas id="c" class="data" p:on-resize="fit"></canvas>"#).unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "fit");
    page.init();
    page.window.resize(800.0, 600.0);
    page.window.resize(1024.0, 768.0);
    assert_eq!(log.len(), 2);
    assert_eq!(log.calls()[1].element.as_deref(), Some("c"));
}

#[test]
fn element_resize_binding() {
    let config = RuntimeConfig::default().with_resize_binding(ResizeBinding::Element);
    let page =
        PageFixture::with_config(r#"<canvas id="c" class="data" p:on-resize="fit"></canvas>"#, config)
            .unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "fit");
    page.init();
    // Observing reports the initial size.
    assert_eq!(log.len(), 1);

    let c = page.element("c").unwrap();
    page.window.set_element_size(c, 300.0, 150.0);
    page.window.set_element_size(c, 300.0, 150.0);
    page.window.resize(10.0, 10.0);
    assert_eq!(log.len(), 2);
}

#[test]
fn templates_are_stored_after_directives() {
    let page = PageFixture::new(
        r#"<div id="host" class="data" p:init="at_init" p:init-vis="at_vis"></div>
           <template name="row"><li>item</li></template>"#,
    )
    .unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    for name in ["at_init", "at_vis"] {
        let sink = Rc::clone(&seen);
        page.registry.register_handler(name, move |reg, _| {
            sink.borrow_mut().push((name, reg.template("row").is_ok()));
        });
    }
    let report = page.init();
    assert_eq!(report.templates, vec!["row".to_owned()]);

    let host = page.element("host").unwrap();
    page.window.set_intersection_ratio(host, 1.0);
    assert_eq!(*seen.borrow(), vec![("at_init", false), ("at_vis", true)]);
}

#[test]
fn dynamic_subtree_processing() {
    let page = PageFixture::new(r#"<ul id="list"></ul>"#).unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "picked");
    page.init();

    let doc = page.document();
    let list = page.element("list").unwrap();
    doc.set_inner_markup(
        list,
        r#"<li id="one" class="data" p:on-click="picked">1</li><li id="two">2</li>"#,
    )
    .unwrap();
    let report = page.registry.process_subtree(list, false);
    assert_eq!(report.elements, 1);

    assert!(page.click("one"));
    assert!(page.click("two"));
    assert_eq!(log.len(), 1);
}

#[test]
fn custom_namespace_and_marker() {
    let config = RuntimeConfig::default()
        .with_namespace("app")
        .with_marker_class("live");
    let page = PageFixture::with_config(
        r#"<div id="a" class="live" app:init="seen" p:init="ignored"></div>"#,
        config,
    )
    .unwrap();
    let log = CallLog::new();
    log.register(&page.registry, "seen");
    assert!(page.init().is_clean());
    assert_eq!(log.names(), vec!["seen"]);
}
