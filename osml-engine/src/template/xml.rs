// XML Reader
// Builds a template tree from XML text using quick-xml events

use crate::template::dom::{Document, NodeId, NodeKind};

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Error parsing an XML document
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XmlError {
    #[error("XML parse error at byte {position}: {message}")]
    Parse { message: String, position: u64 },

    #[error("invalid UTF-8 in XML: {0}")]
    InvalidUtf8(String),

    #[error("unexpected closing tag </{0}>")]
    UnexpectedEnd(String),

    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

/// Parse XML text into a new document. Whitespace text, comments and
/// qualified names are preserved; CDATA becomes text.
pub fn parse_document(input: &str) -> Result<Document, XmlError> {
    let mut doc = Document::new();
    let root = doc.root();
    parse_into(&mut doc, root, input)?;
    Ok(doc)
}

/// Parse XML text and append its top-level nodes under `parent`
pub fn parse_into(doc: &mut Document, parent: NodeId, input: &str) -> Result<(), XmlError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<NodeId> = vec![parent];

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| XmlError::Parse {
            message: e.to_string(),
            position,
        })?;
        let current = *stack.last().unwrap_or(&parent);

        match event {
            Event::Start(ref e) => {
                let element = start_element(doc, e)?;
                doc.append_child(current, element);
                stack.push(element);
            }
            Event::Empty(ref e) => {
                let element = start_element(doc, e)?;
                doc.append_child(current, element);
            }
            Event::End(e) => {
                let name = utf8(e.name().as_ref())?;
                if stack.len() <= 1 {
                    return Err(XmlError::UnexpectedEnd(name));
                }
                stack.pop();
            }
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|e| XmlError::Parse {
                        message: e.to_string(),
                        position,
                    })?;
                append_text(doc, current, &text);
            }
            Event::CData(e) => {
                let text = utf8(e.as_ref())?;
                append_text(doc, current, &text);
            }
            Event::GeneralRef(e) => {
                let raw = e.decode().map_err(|e| XmlError::Parse {
                    message: e.to_string(),
                    position,
                })?;
                let resolved = resolve_entity(&raw, position)?;
                append_text(doc, current, &resolved);
            }
            Event::Comment(e) => {
                let text = utf8(e.as_ref())?;
                let comment = doc.create_comment(text);
                doc.append_child(current, comment);
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if stack.len() > 1 {
        let open = stack
            .last()
            .and_then(|&id| doc.tag_name(id))
            .unwrap_or_default()
            .to_string();
        return Err(XmlError::Unclosed(open));
    }
    Ok(())
}

fn start_element(doc: &mut Document, start: &BytesStart<'_>) -> Result<NodeId, XmlError> {
    let name = utf8(start.name().as_ref())?;
    let element = doc.create_element(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse {
            message: e.to_string(),
            position: 0,
        })?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(|e| XmlError::Parse {
            message: e.to_string(),
            position: 0,
        })?;
        doc.set_attribute(element, key, value.into_owned());
    }
    Ok(element)
}

/// Adjacent text runs (split around entity references) merge into one node
fn append_text(doc: &mut Document, parent: NodeId, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(&last) = doc.children(parent).last() {
        if let NodeKind::Text(existing) = doc.kind_mut(last) {
            existing.push_str(text);
            return;
        }
    }
    let node = doc.create_text(text);
    doc.append_child(parent, node);
}

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::InvalidUtf8(e.to_string()))
}

fn resolve_entity(raw: &str, position: u64) -> Result<String, XmlError> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.into());
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            rest.parse::<u32>().ok()
        };
        return code
            .and_then(char::from_u32)
            .map(|ch| ch.to_string())
            .ok_or_else(|| XmlError::Parse {
                message: format!("invalid character reference &{};", raw),
                position,
            });
    }

    Ok(format!("&{};", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_round_trip() {
        let source = r#"<div class="a"><os:Repeat expression="${items}"><span>${Cur}</span></os:Repeat><br/></div>"#;
        let doc = parse_document(source).unwrap();
        assert_eq!(doc.to_xml(doc.root()), source);
    }

    #[test]
    fn test_parse_keeps_whitespace_and_comments() {
        let doc = parse_document("<p>\n  <!-- note -->\n  x</p>").unwrap();
        assert_eq!(doc.to_xml(doc.root()), "<p>\n  <!-- note -->\n  x</p>");
    }

    #[test]
    fn test_parse_entities_merge_into_text() {
        let doc = parse_document("<p>a &amp; b &#65;</p>").unwrap();
        let p = doc.document_element().unwrap();
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "a & b A");
    }

    #[test]
    fn test_parse_attribute_entities() {
        let doc = parse_document(r#"<a title="x &lt; y"/>"#).unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(doc.attribute(a, "title"), Some("x < y"));
    }

    #[test]
    fn test_parse_cdata_is_text() {
        let doc = parse_document("<script><![CDATA[if (a < b) {}]]></script>").unwrap();
        let script = doc.document_element().unwrap();
        assert_eq!(doc.text_content(script), "if (a < b) {}");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("<a><b/>").is_err());
    }
}
