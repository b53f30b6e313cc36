//! Minimal element tree for tagfile documents.
//!
//! Tagfiles carry all of their data in attributes, so the tree only keeps
//! element names, attributes (in document order) and child elements. Text
//! content and comments are not preserved.

mod reader;
mod writer;

pub use reader::parse_document;
pub use writer::write_document;

/// `<?xml ...?>` declaration of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Declaration {
            version: "1.0".to_string(),
            encoding: Some("ascii".to_string()),
            standalone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in the order they appeared (or were added).
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute append.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace an attribute in place, or append it when absent.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute lookup that reports a malformed document when missing.
    pub(crate) fn require_attr(&self, key: &str) -> crate::Result<&str> {
        self.attr(key).ok_or_else(|| {
            crate::BehaviorError::Xml(format!("<{}> is missing attribute '{}'", self.name, key))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub root: Element,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_attr_keeps_position() {
        let mut el = Element::new("real")
            .with_attr("dec", "0,5")
            .with_attr("hex", "#3fe0000000000000");
        el.set_attr("dec", "1,5");
        assert_eq!(el.attrs[0], ("dec".to_string(), "1,5".to_string()));
        el.set_attr("extra", "x");
        assert_eq!(el.attrs.len(), 3);
        assert_eq!(el.attr("extra"), Some("x"));
    }
}
