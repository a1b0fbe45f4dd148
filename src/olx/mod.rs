//! OLX output tree building and serialization.
//!
//! OLX documents are plain XML. Content processors assemble them out of
//! [`OlxNode`] values; the serializer is the only place that knows about
//! escaping. There is no decision logic here.

pub mod export;

pub use export::OlxExport;

/// One child entry of an OLX element.
#[derive(Debug, Clone, PartialEq)]
pub enum OlxChild {
    /// A nested element.
    Element(OlxNode),

    /// Plain text, escaped on serialization.
    Text(String),

    /// A CDATA section; the content is emitted verbatim inside the
    /// CDATA markers.
    Cdata(String),

    /// Pre-rendered markup emitted without escaping. Used for problem
    /// descriptions that are already XML fragments.
    Raw(String),
}

/// One OLX element: tag name, attributes in insertion order, ordered
/// children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OlxNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<OlxChild>,
}

impl OlxNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_attributes<N, V>(mut self, attributes: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        for (name, value) in attributes {
            self.attributes.push((name.into(), value.into()));
        }
        self
    }

    pub fn with_child(mut self, child: OlxChild) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_element(self, element: OlxNode) -> Self {
        self.with_child(OlxChild::Element(element))
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(OlxChild::Text(text.into()))
    }

    pub fn with_cdata(self, content: impl Into<String>) -> Self {
        self.with_child(OlxChild::Cdata(content.into()))
    }

    pub fn with_raw(self, markup: impl Into<String>) -> Self {
        self.with_child(OlxChild::Raw(markup.into()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: String) {
        if let Some(entry) = self.attributes.iter_mut().find(|(attr_name, _)| attr_name == name) {
            entry.1 = value;
        } else {
            self.attributes.push((name.to_string(), value));
        }
    }

    /// Serialize the element and its subtree.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out, 0);
        out
    }

    fn write_xml(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }

        out.push_str(">");
        let only_inline = self
            .children
            .iter()
            .all(|child| !matches!(child, OlxChild::Element(_)));
        if !only_inline {
            out.push('\n');
        }

        for child in &self.children {
            match child {
                OlxChild::Element(element) => element.write_xml(out, depth + 1),
                OlxChild::Text(text) => out.push_str(&escape_text(text)),
                OlxChild::Cdata(content) => {
                    out.push_str("<![CDATA[");
                    out.push_str(content);
                    out.push_str("]]>");
                }
                OlxChild::Raw(markup) => out.push_str(markup),
            }
        }

        if !only_inline {
            out.push_str(&indent);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push_str(">\n");
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
