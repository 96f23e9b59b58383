#![forbid(unsafe_code)]

//! Minimal markup reader and writer for the document tree.
//!
//! Accepts the subset pages actually use: elements, quoted / unquoted /
//! boolean attributes, text, comments, doctype, void elements, raw-text
//! `script`/`style`, and `<template>` content fragments.
//!
//! # Failure Modes
//!
//! - A closing tag that matches no open element is an error
//!   ([`MarkupError::UnexpectedClose`]).
//! - A closing tag that matches an outer element implicitly closes the inner
//!   ones (lenient, as browsers do).
//! - Unterminated tags or comments report [`MarkupError::UnexpectedEof`].

use std::fmt;

use crate::dom::{Document, NodeId, NodeKind};

/// Errors from [`parse_fragment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// Input ended inside a tag, comment, or raw-text element.
    UnexpectedEof,
    /// `</tag>` with no matching open element.
    UnexpectedClose { tag: String, offset: usize },
    /// `<` followed by something that is not a tag name.
    InvalidTag { offset: usize },
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of markup"),
            Self::UnexpectedClose { tag, offset } => {
                write!(f, "unexpected closing tag </{tag}> at byte {offset}")
            }
            Self::InvalidTag { offset } => write!(f, "invalid tag at byte {offset}"),
        }
    }
}

impl std::error::Error for MarkupError {}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn skip_past(&mut self, needle: &str) -> Result<(), MarkupError> {
        match self.rest().find(needle) {
            Some(i) => {
                self.pos += i + needle.len();
                Ok(())
            }
            None => Err(MarkupError::UnexpectedEof),
        }
    }
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '>' | '/' | '=' | '"' | '\'' | '<')
}

/// Parse `source` into a new detached fragment of `doc`.
pub fn parse_fragment(doc: &Document, source: &str) -> Result<NodeId, MarkupError> {
    let fragment = doc.create_fragment();
    let mut p = Parser { src: source, pos: 0 };
    // Open element stack; the bottom entry is the fragment itself.
    let mut stack: Vec<(NodeId, String)> = vec![(fragment, String::new())];

    while !p.eof() {
        let insert_into = insertion_point(doc, &stack, fragment);
        if p.rest().starts_with("<!--") {
            p.skip_past("-->")?;
        } else if p.rest().starts_with("<!") || p.rest().starts_with("<?") {
            p.skip_past(">")?;
        } else if p.rest().starts_with("</") {
            let offset = p.pos;
            p.pos += 2;
            let tag = p.take_while(is_name_char).to_ascii_lowercase();
            p.skip_past(">")?;
            match stack.iter().rposition(|(_, t)| *t == tag) {
                Some(i) if i > 0 => stack.truncate(i),
                _ => return Err(MarkupError::UnexpectedClose { tag, offset }),
            }
        } else if p.rest().starts_with('<') {
            let offset = p.pos;
            p.bump();
            let tag = p.take_while(is_name_char).to_ascii_lowercase();
            if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return Err(MarkupError::InvalidTag { offset });
            }
            let el = doc.create_element(&tag);
            let self_closing = parse_attributes(doc, el, &mut p)?;
            doc.append_child(insert_into, el);

            if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                let close = format!("</{tag}");
                let end = p
                    .rest()
                    .to_ascii_lowercase()
                    .find(&close)
                    .ok_or(MarkupError::UnexpectedEof)?;
                let raw = &p.rest()[..end];
                if !raw.is_empty() {
                    let text = doc.create_text(raw);
                    doc.append_child(el, text);
                }
                p.pos += end;
                p.skip_past(">")?;
            } else if !self_closing && !is_void(&tag) {
                stack.push((el, tag));
            }
        } else {
            let text = p.take_while(|c| c != '<');
            if !text.trim().is_empty() {
                let node = doc.create_text(&decode_entities(text));
                doc.append_child(insert_into, node);
            }
        }
    }
    Ok(fragment)
}

/// Children of an open `<template>` go into its content fragment.
fn insertion_point(doc: &Document, stack: &[(NodeId, String)], fragment: NodeId) -> NodeId {
    let (top, tag) = stack
        .last()
        .map_or((fragment, ""), |(n, t)| (*n, t.as_str()));
    if tag == "template" {
        doc.template_content(top).unwrap_or(top)
    } else {
        top
    }
}

/// Returns whether the tag was self-closed (`/>`).
fn parse_attributes(doc: &Document, el: NodeId, p: &mut Parser<'_>) -> Result<bool, MarkupError> {
    loop {
        p.skip_whitespace();
        match p.peek() {
            None => return Err(MarkupError::UnexpectedEof),
            Some('>') => {
                p.bump();
                return Ok(false);
            }
            Some('/') => {
                p.bump();
                if p.peek() == Some('>') {
                    p.bump();
                    return Ok(true);
                }
            }
            Some(_) => {
                let name = p.take_while(is_name_char).to_ascii_lowercase();
                if name.is_empty() {
                    // Stray quote or '='; skip it.
                    p.bump();
                    continue;
                }
                p.skip_whitespace();
                let value = if p.peek() == Some('=') {
                    p.bump();
                    p.skip_whitespace();
                    match p.peek() {
                        Some(q @ ('"' | '\'')) => {
                            p.bump();
                            let v = p.take_while(|c| c != q);
                            if p.bump().is_none() {
                                return Err(MarkupError::UnexpectedEof);
                            }
                            decode_entities(v)
                        }
                        _ => decode_entities(
                            p.take_while(|c| !c.is_whitespace() && c != '>'),
                        ),
                    }
                } else {
                    String::new()
                };
                // First occurrence wins.
                if !doc.has_attribute(el, &name) {
                    doc.set_attribute(el, &name, &value);
                }
            }
        }
    }
}

/// Decode the basic named entities and numeric references.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let Some(end) = rest.find(';').filter(|e| *e <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Serialize the children of `id`.
#[must_use]
pub fn serialize_children(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    let raw = doc
        .tag(id)
        .is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t.as_str()));
    for child in doc.children(id) {
        write_node(doc, child, raw, &mut out);
    }
    out
}

/// Serialize `id` and its subtree.
#[must_use]
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, false, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    match doc.kind(id) {
        Some(NodeKind::Text(text)) => {
            if raw_text {
                out.push_str(&text);
            } else {
                escape_text(&text, out);
            }
        }
        Some(NodeKind::Element(_)) => {
            let tag = doc.tag(id).unwrap_or_default();
            out.push('<');
            out.push_str(&tag);
            for (name, value) in doc.attributes(id) {
                out.push(' ');
                out.push_str(&name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape_attribute(&value, out);
                    out.push('"');
                }
            }
            out.push('>');
            if is_void(&tag) {
                return;
            }
            let content = doc.template_content(id).unwrap_or(id);
            out.push_str(&serialize_children(doc, content));
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        Some(NodeKind::Fragment | NodeKind::Document) => {
            out.push_str(&serialize_children(doc, id));
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> (Document, NodeId) {
        let doc = Document::new();
        let frag = parse_fragment(&doc, src).unwrap();
        (doc, frag)
    }

    #[test]
    fn parses_nested_elements_and_attributes() {
        let (doc, frag) = parse(r#"<div class="data" p:init="a,b"><span id=x>hi</span></div>"#);
        let div = doc.first_element_child(frag).unwrap();
        assert_eq!(doc.tag(div).as_deref(), Some("div"));
        assert_eq!(doc.attribute(div, "p:init").as_deref(), Some("a,b"));
        let span = doc.first_element_child(div).unwrap();
        assert_eq!(doc.attribute(span, "id").as_deref(), Some("x"));
        assert_eq!(doc.text_content(span), "hi");
    }

    #[test]
    fn attribute_names_keep_parentheses_and_commas() {
        let (doc, frag) =
            parse(r#"<img class="data" p:on-attrchange(src,srcset)="reload" hidden>"#);
        let img = doc.first_element_child(frag).unwrap();
        assert_eq!(
            doc.attributes(img),
            vec![
                ("class".to_owned(), "data".to_owned()),
                ("p:on-attrchange(src,srcset)".to_owned(), "reload".to_owned()),
                ("hidden".to_owned(), String::new()),
            ]
        );
    }

    #[test]
    fn attribute_names_are_lowercased() {
        let (doc, frag) = parse(r#"<div P:On-Click="go"></div>"#);
        let div = doc.first_element_child(frag).unwrap();
        assert_eq!(doc.attribute(div, "p:on-click").as_deref(), Some("go"));
    }

    #[test]
    fn void_elements_do_not_nest() {
        let (doc, frag) = parse(r#"<input type="number"><b>x</b>"#);
        assert_eq!(doc.element_children(frag).len(), 2);
    }

    #[test]
    fn template_children_go_to_content() {
        let (doc, frag) = parse(r#"<template name="tooltip"><div class="tip"></div></template>"#);
        let template = doc.first_element_child(frag).unwrap();
        assert!(doc.children(template).is_empty());
        let content = doc.template_content(template).unwrap();
        assert_eq!(doc.element_children(content).len(), 1);
    }

    #[test]
    fn comments_and_whitespace_are_dropped() {
        let (doc, frag) = parse("<!-- note -->\n  <p>a</p>\n");
        assert_eq!(doc.children(frag).len(), 1);
    }

    #[test]
    fn script_is_raw_text() {
        let (doc, frag) = parse("<script>if (a < b) {}</script>");
        let script = doc.first_element_child(frag).unwrap();
        assert_eq!(doc.text_content(script), "if (a < b) {}");
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#39;d&#x27;"), "a & b <c> 'd'");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }

    #[test]
    fn implicit_close_of_inner_elements() {
        let (doc, frag) = parse("<div><p>one</div><span></span>");
        assert_eq!(doc.element_children(frag).len(), 2);
    }

    #[test]
    fn stray_close_is_an_error() {
        let doc = Document::new();
        assert_eq!(
            parse_fragment(&doc, "<div></span>"),
            Err(MarkupError::UnexpectedClose {
                tag: "span".to_owned(),
                offset: 5
            })
        );
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let doc = Document::new();
        assert_eq!(parse_fragment(&doc, "<div"), Err(MarkupError::UnexpectedEof));
    }

    #[test]
    fn serialize_round_trips_structure() {
        let src = r#"<div class="a"><b>x &amp; y</b><br></div>"#;
        let (doc, frag) = parse(src);
        assert_eq!(serialize_children(&doc, frag), src);
    }
}
