use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

use super::{Declaration, Element, XmlDocument};
use crate::{BehaviorError, Result};

fn xml_err(position: usize, msg: impl std::fmt::Display) -> BehaviorError {
    BehaviorError::Xml(format!("at byte {position}: {msg}"))
}

fn utf8(bytes: &[u8], position: usize) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| xml_err(position, e))
}

fn element_from(start: &BytesStart<'_>, position: usize) -> Result<Element> {
    let mut element = Element::new(utf8(start.name().as_ref(), position)?);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_err(position, e))?;
        let key = utf8(attr.key.as_ref(), position)?;
        let value = attr
            .unescape_value()
            .map_err(|e| xml_err(position, e))?
            .into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

fn declaration_from(decl: &BytesDecl<'_>, position: usize) -> Result<Declaration> {
    let version = utf8(&decl.version().map_err(|e| xml_err(position, e))?, position)?;
    let encoding = match decl.encoding() {
        Some(enc) => Some(utf8(&enc.map_err(|e| xml_err(position, e))?, position)?),
        None => None,
    };
    let standalone = match decl.standalone() {
        Some(sa) => Some(utf8(&sa.map_err(|e| xml_err(position, e))?, position)?),
        None => None,
    };
    Ok(Declaration {
        version,
        encoding,
        standalone,
    })
}

/// Attach a finished element to its parent, or make it the root.
fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element, position: usize) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(xml_err(position, "multiple root elements")),
    }
}

/// Parse a tagfile document. Comments and processing instructions are dropped;
/// non-whitespace text content is rejected since it could not be written back.
pub fn parse_document(src: &str) -> Result<XmlDocument> {
    let mut reader = Reader::from_str(src);
    reader.trim_text(true);

    let mut declaration = None;
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Decl(decl)) => declaration = Some(declaration_from(&decl, position)?),
            Ok(Event::Start(start)) => stack.push(element_from(&start, position)?),
            Ok(Event::Empty(start)) => {
                let element = element_from(&start, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_err(position, "unbalanced closing tag"))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| xml_err(position, e))?;
                if !text.trim().is_empty() {
                    return Err(xml_err(position, format!("unexpected text content '{text}'")));
                }
            }
            Ok(Event::CData(_)) => return Err(xml_err(position, "unexpected CDATA section")),
            Ok(Event::Comment(_)) | Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(position, e)),
        }
    }

    if !stack.is_empty() {
        return Err(xml_err(src.len(), "unexpected end of document"));
    }
    let root = root.ok_or_else(|| xml_err(0, "document has no root element"))?;
    Ok(XmlDocument { declaration, root })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = parse_document(
            r#"<?xml version="1.0" encoding="ascii"?>
<!-- dropped -->
<root a="1" b="x &amp; y">
  <child id="c1"/>
  <child id="c2"><leaf/></child>
</root>"#,
        )
        .unwrap();
        let decl = doc.declaration.unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("ascii"));
        assert_eq!(doc.root.name, "root");
        assert_eq!(doc.root.attr("b"), Some("x & y"));
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(doc.root.children[1].children[0].name, "leaf");
    }

    #[test]
    fn rejects_text_content_and_truncation() {
        assert!(parse_document("<root>hello</root>").is_err());
        assert!(parse_document("<root><a>").is_err());
        assert!(parse_document("").is_err());
    }
}
