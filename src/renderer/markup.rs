//! Parsing SVG markup back into a [`Document`]

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::document::{Document, NodeId};

/// Malformed markup, with the byte position the reader stopped at
#[derive(Debug, Clone, Error)]
#[error("malformed markup at byte {position}: {message}")]
pub struct MarkupError {
    pub position: usize,
    pub message: String,
}

impl MarkupError {
    fn new(position: impl TryInto<usize>, message: impl Into<String>) -> Self {
        Self {
            position: position.try_into().unwrap_or(usize::MAX),
            message: message.into(),
        }
    }
}

/// Parse markup into a document rooted at its first element
///
/// Comments, processing instructions and the XML declaration are dropped.
pub fn parse(markup: &str) -> Result<Document, MarkupError> {
    let mut reader = Reader::from_str(markup);
    let mut doc: Option<Document> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| MarkupError::new(position, e.to_string()))?;

        match event {
            Event::Start(start) => {
                let id = open_element(&mut doc, stack.last().copied(), &start, position)?;
                stack.push(id);
            }
            Event::Empty(start) => {
                open_element(&mut doc, stack.last().copied(), &start, position)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&text).into_owned()));
                push_text(&mut doc, &stack, &content, position)?;
            }
            Event::CData(data) => {
                let content = String::from_utf8_lossy(&data).into_owned();
                push_text(&mut doc, &stack, &content, position)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        let open = doc
            .as_ref()
            .map(|d| d.describe(stack[stack.len() - 1]))
            .unwrap_or_default();
        return Err(MarkupError::new(markup.len(), format!("unclosed element {}", open)));
    }
    doc.ok_or_else(|| MarkupError::new(markup.len(), "no root element"))
}

fn open_element(
    doc: &mut Option<Document>,
    parent: Option<NodeId>,
    start: &BytesStart<'_>,
    position: impl TryInto<usize> + Copy,
) -> Result<NodeId, MarkupError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let id = match doc.as_mut() {
        Some(doc) => match parent {
            Some(parent) => doc.append_element(parent, &tag),
            None => return Err(MarkupError::new(position, "content after the root element")),
        },
        None => {
            let created = Document::with_root(&tag);
            let root = created.root();
            *doc = Some(created);
            root
        }
    };

    let doc = doc.as_mut().ok_or_else(|| MarkupError::new(position, "no root element"))?;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| MarkupError::new(position, e.to_string()))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(Cow::into_owned)
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        doc.set_attr(id, &name, &value);
    }
    Ok(id)
}

fn push_text(
    doc: &mut Option<Document>,
    stack: &[NodeId],
    content: &str,
    position: impl TryInto<usize>,
) -> Result<(), MarkupError> {
    match (doc.as_mut(), stack.last()) {
        (Some(doc), Some(parent)) => {
            doc.append_text(*parent, content);
            Ok(())
        }
        _ if content.trim().is_empty() => Ok(()),
        _ => Err(MarkupError::new(position, "text outside the root element")),
    }
}

/// Parse SVG markup and check that its root is `<svg>`
pub fn parse_svg(markup: &str) -> Result<Document, MarkupError> {
    let doc = parse(markup)?;
    match doc.tag(doc.root()) {
        Some("svg") => Ok(doc),
        other => Err(MarkupError::new(
            0usize,
            format!("expected an <svg> root, found <{}>", other.unwrap_or("?")),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_round_trips_structure() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><g id="a"><rect width="5"/></g><text>hi &amp; bye</text></svg>"#;
        let doc = parse(markup).unwrap();
        assert_eq!(doc.to_markup(false), markup);
    }

    #[test]
    fn test_parse_drops_comments_and_declaration() {
        let doc = parse(r#"<?xml version="1.0"?><!-- note --><svg><!-- inner --><rect/></svg>"#).unwrap();
        assert_eq!(doc.to_markup(false), "<svg><rect/></svg>");
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(parse("<svg><g></svg>").is_err());
    }

    #[test]
    fn test_parse_rejects_unclosed_root() {
        assert!(parse("<svg><g/>").is_err());
        assert!(parse("<svg/><svg/>").is_err());
    }

    #[test]
    fn test_parse_svg_requires_svg_root() {
        assert!(parse_svg("<svg/>").is_ok());
        let err = parse_svg("<html/>").unwrap_err();
        assert!(err.message.contains("<html>"));
    }

    #[test]
    fn test_parse_keeps_cdata_as_text() {
        let doc = parse("<svg><style><![CDATA[a > b { fill: red }]]></style></svg>").unwrap();
        let style = doc
            .descendants(doc.root())
            .into_iter()
            .find(|id| doc.tag(*id) == Some("style"))
            .unwrap();
        assert_eq!(doc.text_content(style), "a > b { fill: red }");
    }
}
