//! A minimal XML element tree and its serializer.
//!
//! Feed documents are assembled and rewritten as [`Element`] trees and
//! serialized once with `quick-xml`. Elements hold either nothing, text, or
//! child elements; feeds never need mixed content.

use crate::error::PipelineError;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Text(String),
    Children(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub body: Body,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Shorthand for an element holding only text.
    pub fn text_node(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).with_text(text)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = Body::Text(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children_mut().push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Add `key="value"` unless the attribute is already present.
    pub fn set_attr_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.attr(key).is_some() {
            return false;
        }
        self.attributes.push((key.to_string(), value.to_string()));
        true
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Element] {
        match &self.body {
            Body::Children(c) => c,
            _ => &[],
        }
    }

    /// Mutable children; an empty or text element becomes a container.
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        if !matches!(self.body, Body::Children(_)) {
            self.body = Body::Children(Vec::new());
        }
        match &mut self.body {
            Body::Children(c) => c,
            _ => unreachable!("body was just made a container"),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        match &mut self.body {
            Body::Children(c) => c.iter_mut().find(|c| c.name == name),
            _ => None,
        }
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.children().iter().position(|c| c.name == name)
    }
}

/// Characters XML 1.0 allows in content and attribute values.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{fffe}' && c != '\u{ffff}')
}

/// `text` without the characters a well-formed document cannot carry.
pub fn xml_safe(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), PipelineError> {
    writer
        .write_event(event)
        .map_err(|e| PipelineError::Serialization(e.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), PipelineError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), &*xml_safe(value)));
    }
    match &element.body {
        Body::Empty => emit(writer, Event::Empty(start)),
        Body::Text(text) => {
            emit(writer, Event::Start(start))?;
            emit(writer, Event::Text(BytesText::new(&xml_safe(text))))?;
            emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
        }
        Body::Children(children) => {
            emit(writer, Event::Start(start))?;
            for child in children {
                write_element(writer, child)?;
            }
            emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
        }
    }
}

/// Serialize `root` as an indented UTF-8 XML document with a declaration.
pub fn to_xml_string(root: &Element) -> Result<String, PipelineError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root)?;
    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_nested_elements() {
        let root = Element::new("rss").with_attr("version", "2.0").with_child(
            Element::new("channel")
                .with_child(Element::text_node("title", "A & B <C>"))
                .with_child(Element::new("atom:link").with_attr("href", "https://x/?a=1&b=2")),
        );
        let xml = to_xml_string(&root).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<title>A &amp; B &lt;C&gt;</title>"));
        assert!(xml.contains("href=\"https://x/?a=1&amp;b=2\"/>"));
        assert!(xml.trim_end().ends_with("</rss>"));
    }

    #[test]
    fn test_non_ascii_text_written_verbatim() {
        let xml = to_xml_string(&Element::text_node("title", "今日のダーリン")).unwrap();
        assert!(xml.contains("<title>今日のダーリン</title>"));
    }

    #[test]
    fn test_control_characters_dropped() {
        let root = Element::text_node("description", "bell\u{7}tab\tform\u{c}nul\u{0}end")
            .with_attr("title", "a\u{1b}b");
        let xml = to_xml_string(&root).unwrap();
        assert!(xml.contains("<description title=\"ab\">belltab\tformnulend</description>"));
        assert!(!xml.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')));
    }

    #[test]
    fn test_xml_safe_borrows_clean_text() {
        assert!(matches!(xml_safe("今日のダーリン"), Cow::Borrowed(_)));
        assert_eq!(xml_safe("a\u{fffe}b"), "ab");
    }

    #[test]
    fn test_set_attr_if_absent() {
        let mut el = Element::new("feed");
        assert!(el.set_attr_if_absent("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
        assert!(!el.set_attr_if_absent("xmlns:dc", "other"));
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attr("xmlns:dc"), Some("http://purl.org/dc/elements/1.1/"));
    }

    #[test]
    fn test_children_mut_converts_empty() {
        let mut el = Element::new("item");
        assert!(el.children().is_empty());
        el.children_mut().push(Element::text_node("link", "x"));
        assert_eq!(el.position_of("link"), Some(0));
        assert_eq!(el.child("link").and_then(Element::text), Some("x"));
    }
}
