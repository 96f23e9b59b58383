//! Tooltip hover intent driven through the virtual clock.

use pretty_assertions::assert_eq;
use pwire_core::{Event, NodeId};
use pwire_harness::PageFixture;
use pwire_runtime::directive::HAS_TOOLTIP_CLASS;
use pwire_widgets::{HoverState, TooltipConfig, Widgets, WidgetsConfig};

const PAGE: &str = r##"<span id="a" class="data" p:tooltip="Plain <b>text</b>">a</span>
<span id="b" class="data" p:tooltip="#b-body">b</span>
<div id="b-body"><em>rich</em> body</div>
<template name="tooltip"><div class="tooltip"></div></template>"##;

fn page_with(config: WidgetsConfig) -> (PageFixture, Widgets) {
    let page = PageFixture::new(PAGE).unwrap();
    let widgets = pwire_widgets::install(&page.registry, config).unwrap();
    assert!(page.init().is_clean());
    (page, widgets)
}

fn page() -> (PageFixture, Widgets) {
    page_with(WidgetsConfig::default())
}

fn enter(page: &PageFixture, anchor: NodeId) {
    page.dispatch(anchor, &Event::pointer("mouseenter", 0.0, 0.0));
}

fn leave(page: &PageFixture, anchor: NodeId) {
    page.dispatch(anchor, &Event::pointer("mouseleave", 0.0, 0.0));
}

#[test]
fn anchors_are_marked_and_sources_consumed() {
    let (page, _) = page();
    let doc = page.document();
    assert!(doc.has_class(page.element("a").unwrap(), HAS_TOOLTIP_CLASS));
    assert!(doc.has_class(page.element("b").unwrap(), HAS_TOOLTIP_CLASS));

    assert_eq!(page.element("b-body"), None);
    assert_eq!(
        page.registry.tooltip_body(page.element("b").unwrap()).as_deref(),
        Some("<em>rich</em> body")
    );
}

#[test]
fn shows_after_the_delay_and_hides_after_leaving() {
    let (page, widgets) = page();
    let a = page.element("a").unwrap();
    let tips = &widgets.tooltips;

    enter(&page, a);
    assert_eq!(tips.state(a), HoverState::PendingShow);
    page.advance_ms(499);
    assert_eq!(tips.state(a), HoverState::PendingShow);
    page.advance_ms(1);
    assert_eq!(tips.state(a), HoverState::Visible);

    let doc = page.document();
    let tooltip = tips.tooltip_element(a).unwrap();
    assert!(doc.is_connected(tooltip));
    assert!(doc.has_class(tooltip, "tooltip"));
    assert_eq!(doc.inner_markup(tooltip), "Plain <b>text</b>");

    leave(&page, a);
    assert_eq!(tips.state(a), HoverState::PendingHide);
    page.advance_ms(500);
    assert_eq!(tips.state(a), HoverState::Idle);
    assert!(!doc.is_connected(tooltip));
}

#[test]
fn brief_hover_never_shows() {
    let (page, widgets) = page();
    let a = page.element("a").unwrap();
    enter(&page, a);
    page.advance_ms(200);
    leave(&page, a);
    page.advance_ms(1_000);
    assert_eq!(widgets.tooltips.state(a), HoverState::Idle);
    assert_eq!(widgets.tooltips.tooltip_element(a), None);
    assert_eq!(page.window.pending_timers(), 0);
}

#[test]
fn returning_during_hide_keeps_it_visible() {
    let (page, widgets) = page();
    let a = page.element("a").unwrap();
    enter(&page, a);
    page.advance_ms(500);
    leave(&page, a);
    page.advance_ms(100);
    enter(&page, a);
    page.advance_ms(1_000);
    assert_eq!(widgets.tooltips.state(a), HoverState::Visible);
    assert_eq!(widgets.tooltips.active_anchor(), Some(a));
}

#[test]
fn only_one_tooltip_at_a_time() {
    let (page, widgets) = page();
    let a = page.element("a").unwrap();
    let b = page.element("b").unwrap();
    let tips = &widgets.tooltips;

    enter(&page, a);
    page.advance_ms(500);
    // Moving to b before a's hide fires.
    leave(&page, a);
    enter(&page, b);
    page.advance_ms(500);

    assert_eq!(tips.active_anchor(), Some(b));
    assert_eq!(tips.state(a), HoverState::Idle);
    let doc = page.document();
    assert!(!doc.is_connected(tips.tooltip_element(a).unwrap()));
    let tip_b = tips.tooltip_element(b).unwrap();
    assert_eq!(doc.inner_markup(tip_b), "<em>rich</em> body");
}

#[test]
fn configured_delays_apply() {
    let tooltip = TooltipConfig::default()
        .with_show_delay(std::time::Duration::from_millis(100))
        .with_hide_delay(std::time::Duration::from_millis(50));
    let (page, widgets) = page_with(WidgetsConfig::default().with_tooltip(tooltip));
    let a = page.element("a").unwrap();
    enter(&page, a);
    page.advance_ms(100);
    assert_eq!(widgets.tooltips.state(a), HoverState::Visible);
    leave(&page, a);
    page.advance_ms(50);
    assert_eq!(widgets.tooltips.state(a), HoverState::Idle);
}

#[test]
fn tooltip_without_widgets_reports_missing_handlers() {
    let page = PageFixture::new(PAGE).unwrap();
    let report = page.init();
    assert_eq!(report.errors.len(), 4);
    let alerts = page.take_alerts();
    assert_eq!(
        alerts[..2],
        [
            "event function not found: tooltip_begin".to_owned(),
            "event function not found: tooltip_end".to_owned(),
        ]
    );
    assert!(!page
        .document()
        .has_class(page.element("a").unwrap(), HAS_TOOLTIP_CLASS));
}
