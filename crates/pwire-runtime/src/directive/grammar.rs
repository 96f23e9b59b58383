#![forbid(unsafe_code)]

//! Directive attribute grammar.
//!
//! ```text
//! <ns>:init       = name-list
//! <ns>:init-vis   = name-list
//! <ns>:tooltip    = text | "#" id
//! <ns>:on-<events> = name-list
//!
//! name-list  = name *( "," name )          ; empties skipped, trimmed
//! events     = event *( "," event )        ; split at paren depth 0
//! event      = "resize"
//!            | "vis-change" *any
//!            | "attrchange(" name-list ")"
//!            | "objchange(" path *( "&" path ) ")"
//!            | native-event-name
//! path       = segment *( "." segment )
//! ```
//!
//! Paths inside `objchange(...)` are `&`-separated because the event list
//! itself is comma-separated.

use std::fmt;

use crate::error::DirectiveError;

/// A dotted `objchange` path such as `p.config.value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    segments: Vec<String>,
}

impl ObjectPath {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(raw: &str) -> Result<Self, DirectiveError> {
        let raw = raw.trim();
        let segments: Vec<String> = raw.split('.').map(|s| s.trim().to_owned()).collect();
        if raw.is_empty() || segments.iter().any(String::is_empty) {
            return Err(DirectiveError::InvalidObjectPath {
                raw: raw.to_owned(),
            });
        }
        Ok(Self { segments })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Segments after the root.
    #[must_use]
    pub fn rest(&self) -> &[String] {
        &self.segments[1..]
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// One parsed event name from an `on-` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSpec {
    /// Window (or element) resize.
    Resize,
    /// Visibility enter/leave transitions.
    VisChange,
    /// Value changes of the listed attributes.
    AttrChange(Vec<String>),
    /// Changes of observable data at the listed paths.
    ObjChange(Vec<ObjectPath>),
    /// Any other event, listened for on the element itself.
    Native(String),
}

/// Where a tooltip body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TooltipSource {
    Text(String),
    /// `#id`: the inner markup of another element.
    ElementRef(String),
}

impl TooltipSource {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        Some(match raw.strip_prefix('#') {
            Some(id) => Self::ElementRef(id.to_owned()),
            None => Self::Text(raw.to_owned()),
        })
    }
}

/// One event × handler pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub event: EventSpec,
    pub handler: String,
}

/// Everything the directives of one element ask for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectiveSet {
    pub init: Vec<String>,
    pub init_vis: Vec<String>,
    pub tooltip: Option<TooltipSource>,
    /// In attribute order; event-major within one attribute.
    pub bindings: Vec<Binding>,
}

impl DirectiveSet {
    /// Parse the directives among `attributes` using the `<namespace>:`
    /// prefix. Malformed event names are returned as errors and skipped;
    /// the rest of the set still parses.
    #[must_use]
    pub fn from_attributes(
        attributes: &[(String, String)],
        namespace: &str,
    ) -> (Self, Vec<DirectiveError>) {
        let prefix = format!("{namespace}:");
        let on_prefix = format!("{prefix}on-");
        let mut set = Self::default();
        let mut errors = Vec::new();

        for (name, value) in attributes {
            let Some(directive) = name.strip_prefix(&prefix) else {
                continue;
            };
            match directive {
                "init" => set.init.extend(parse_name_list(value)),
                "init-vis" => set.init_vis.extend(parse_name_list(value)),
                "tooltip" => set.tooltip = TooltipSource::parse(value),
                _ => {
                    let Some(events) = name.strip_prefix(&on_prefix) else {
                        continue;
                    };
                    let mut specs = Vec::new();
                    for raw in parse_event_list(events) {
                        match parse_event_spec(&raw) {
                            Ok(spec) => specs.push(spec),
                            Err(err) => errors.push(err),
                        }
                    }
                    set.bindings
                        .extend(cross_product(&specs, &parse_name_list(value)));
                }
            }
        }
        (set, errors)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.init.is_empty()
            && self.init_vis.is_empty()
            && self.tooltip.is_none()
            && self.bindings.is_empty()
    }
}

/// Split a comma list, trimming entries and skipping empty ones.
#[must_use]
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Split an event list at commas outside parentheses, so
/// `click,attrchange(src,srcset)` yields two events.
#[must_use]
pub fn parse_event_list(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&raw[start..]);
    out.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parenthesized<'a>(raw: &'a str, head: &str) -> Result<&'a str, DirectiveError> {
    raw.strip_prefix(head)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| DirectiveError::InvalidEventSpec {
            raw: raw.to_owned(),
        })
}

/// Classify one event name.
pub fn parse_event_spec(raw: &str) -> Result<EventSpec, DirectiveError> {
    let raw = raw.trim();
    if raw == "resize" {
        Ok(EventSpec::Resize)
    } else if raw.starts_with("vis-change") {
        Ok(EventSpec::VisChange)
    } else if raw.starts_with("attrchange") {
        let names = parse_name_list(parenthesized(raw, "attrchange")?);
        if names.is_empty() {
            return Err(DirectiveError::InvalidEventSpec {
                raw: raw.to_owned(),
            });
        }
        Ok(EventSpec::AttrChange(names))
    } else if raw.starts_with("objchange") {
        let paths = parse_object_paths(parenthesized(raw, "objchange")?)?;
        if paths.is_empty() {
            return Err(DirectiveError::InvalidEventSpec {
                raw: raw.to_owned(),
            });
        }
        Ok(EventSpec::ObjChange(paths))
    } else if raw.is_empty() || raw.contains(['(', ')']) {
        Err(DirectiveError::InvalidEventSpec {
            raw: raw.to_owned(),
        })
    } else {
        Ok(EventSpec::Native(raw.to_owned()))
    }
}

/// Split `&`-joined paths; empty entries are skipped.
pub fn parse_object_paths(raw: &str) -> Result<Vec<ObjectPath>, DirectiveError> {
    raw.split('&')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ObjectPath::parse)
        .collect()
}

/// Every event paired with every handler, event-major.
#[must_use]
pub fn cross_product(events: &[EventSpec], handlers: &[String]) -> Vec<Binding> {
    events
        .iter()
        .flat_map(|event| {
            handlers.iter().map(move |handler| Binding {
                event: event.clone(),
                handler: handler.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn name_list_trims_and_skips_empties() {
        assert_eq!(parse_name_list(" a, ,b,"), vec!["a", "b"]);
        assert!(parse_name_list("").is_empty());
    }

    #[test]
    fn event_list_respects_parentheses() {
        assert_eq!(
            parse_event_list("click,attrchange(src,srcset),vis-change"),
            vec!["click", "attrchange(src,srcset)", "vis-change"]
        );
    }

    #[test]
    fn event_specs() {
        assert_eq!(parse_event_spec("resize").unwrap(), EventSpec::Resize);
        assert_eq!(parse_event_spec("vis-change-any").unwrap(), EventSpec::VisChange);
        assert_eq!(
            parse_event_spec("attrchange(src, srcset)").unwrap(),
            EventSpec::AttrChange(vec!["src".into(), "srcset".into()])
        );
        assert_eq!(
            parse_event_spec("input").unwrap(),
            EventSpec::Native("input".into())
        );
        assert!(parse_event_spec("attrchange(").is_err());
        assert!(parse_event_spec("attrchange()").is_err());
    }

    #[test]
    fn objchange_paths_split_on_ampersand() {
        let EventSpec::ObjChange(paths) =
            parse_event_spec("objchange(p.config.value&store)").unwrap()
        else {
            panic!("expected objchange");
        };
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].root(), "p");
        assert_eq!(paths[0].rest(), ["config".to_owned(), "value".to_owned()]);
        assert_eq!(paths[1].to_string(), "store");
    }

    #[test]
    fn empty_path_segment_is_invalid() {
        assert_eq!(
            ObjectPath::parse("p..x"),
            Err(DirectiveError::InvalidObjectPath { raw: "p..x".into() })
        );
    }

    #[test]
    fn cross_product_is_event_major() {
        let events = vec![EventSpec::Native("a".into()), EventSpec::Native("b".into())];
        let handlers = vec!["f".to_owned(), "g".to_owned()];
        let pairs: Vec<(String, String)> = cross_product(&events, &handlers)
            .into_iter()
            .map(|b| match b.event {
                EventSpec::Native(e) => (e, b.handler),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a".into(), "f".into()),
                ("a".into(), "g".into()),
                ("b".into(), "f".into()),
                ("b".into(), "g".into()),
            ]
        );
    }

    #[test]
    fn directive_set_from_attributes() {
        let (set, errors) = DirectiveSet::from_attributes(
            &attrs(&[
                ("class", "data"),
                ("p:init", "setup,,draw"),
                ("p:init-vis", "reveal"),
                ("p:tooltip", "#help"),
                ("p:on-click,keydown", "go"),
                ("p:on-attrchange(src)", "reload"),
                ("q:on-click", "ignored"),
            ]),
            "p",
        );
        assert!(errors.is_empty());
        assert_eq!(set.init, vec!["setup", "draw"]);
        assert_eq!(set.init_vis, vec!["reveal"]);
        assert_eq!(set.tooltip, Some(TooltipSource::ElementRef("help".into())));
        assert_eq!(set.bindings.len(), 3);
        assert_eq!(set.bindings[2].event, EventSpec::AttrChange(vec!["src".into()]));
    }

    #[test]
    fn bad_event_is_reported_and_siblings_survive() {
        let (set, errors) = DirectiveSet::from_attributes(
            &attrs(&[("p:on-click,objchange(a..b)", "go")]),
            "p",
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(set.bindings.len(), 1);
    }

    #[test]
    fn custom_namespace() {
        let (set, _) = DirectiveSet::from_attributes(&attrs(&[("app:init", "boot")]), "app");
        assert_eq!(set.init, vec!["boot"]);
    }

    #[test]
    fn empty_tooltip_is_none() {
        let (set, _) = DirectiveSet::from_attributes(&attrs(&[("p:tooltip", "")]), "p");
        assert!(set.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn event_list_split_ignores_commas_in_parens(
            names in proptest::collection::vec("[a-z]{1,8}", 1..4),
            watched in proptest::collection::vec("[a-z]{1,8}", 1..4),
        ) {
            let attr = format!("attrchange({})", watched.join(","));
            let mut events = names.clone();
            events.push(attr.clone());
            let split = parse_event_list(&events.join(", "));
            let mut expected = names;
            expected.push(attr);
            proptest::prop_assert_eq!(split, expected);
        }
    }
}
