use std::fmt::Write as _;

use super::{Element, XmlDocument};

const INDENT: &str = "  ";

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}

fn write_element(element: &Element, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>\n");
        return;
    }

    out.push_str(">\n");
    for child in &element.children {
        write_element(child, depth + 1, out);
    }
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    let _ = writeln!(out, "</{}>", element.name);
}

/// Serialize a document in canonical form: one element per line, two-space
/// indentation, self-closing empty elements, trailing newline.
pub fn write_document(doc: &XmlDocument) -> String {
    let mut out = String::new();
    if let Some(decl) = &doc.declaration {
        let _ = write!(out, "<?xml version=\"{}\"", decl.version);
        if let Some(enc) = &decl.encoding {
            let _ = write!(out, " encoding=\"{enc}\"");
        }
        if let Some(sa) = &decl.standalone {
            let _ = write!(out, " standalone=\"{sa}\"");
        }
        out.push_str("?>\n");
    }
    write_element(&doc.root, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse_document, Declaration};

    #[test]
    fn writes_canonical_layout() {
        let doc = XmlDocument {
            declaration: Some(Declaration::default()),
            root: Element::new("root").with_child(
                Element::new("field")
                    .with_attr("name", "a\"b")
                    .with_child(Element::new("string").with_attr("value", "x<y")),
            ),
        };
        let text = write_document(&doc);
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"ascii\"?>\n<root>\n  <field name=\"a&quot;b\">\n    <string value=\"x&lt;y\"/>\n  </field>\n</root>\n"
        );
        assert_eq!(parse_document(&text).unwrap(), doc);
    }
}
