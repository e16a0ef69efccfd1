//! In-memory MPD tree.
//! Elements keep the raw start tag read from the document, so anything the
//! mutator does not touch is written back exactly as it was read.

pub mod locator;
pub mod mutator;
pub mod parser;
pub mod segment_template;
pub mod template;
pub mod writer;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;

use crate::error::{ManifestError, Result};

pub const DASH_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Text, comments, declarations and processing instructions, replayed verbatim
    Misc(Event<'static>),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub start: BytesStart<'static>,
    pub children: Vec<Node>,
    /// Read as `<tag/>`. Cleared once children are appended.
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_string()),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Qualified name as written, prefix included.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.start.name().as_ref()).into_owned()
    }

    /// `local` qualified with this element's prefix, for children that must
    /// share its namespace.
    pub fn qualify(&self, local: &str) -> String {
        match self.start.name().prefix() {
            Some(prefix) => format!("{}:{}", String::from_utf8_lossy(prefix.as_ref()), local),
            None => local.to_string(),
        }
    }

    /// True when the element's local name (prefix stripped) equals `local`.
    pub fn is(&self, local: &str) -> bool {
        self.start.local_name().as_ref() == local.as_bytes()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Misc(_) => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> + '_ {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Misc(_) => None,
        })
    }

    pub fn attribute(&self, key: &str) -> Result<Option<String>> {
        let attr = self
            .start
            .try_get_attribute(key)
            .map_err(|e| ManifestError::invalid_attribute(&self.name(), key, "", e))?;
        match attr {
            Some(attr) => {
                let value = attr
                    .unescape_value()
                    .map_err(|e| ManifestError::invalid_attribute(&self.name(), key, "", e))?;
                Ok(Some(value.into_owned()))
            }
            None => Ok(None),
        }
    }

    pub fn required_attribute(&self, key: &str) -> Result<String> {
        self.attribute(key)?
            .ok_or_else(|| ManifestError::missing_attribute(&self.name(), key))
    }

    /// Set `key` to `value`. An existing attribute of that name is replaced in
    /// place; otherwise the attribute is appended after the existing ones.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<()> {
        let exists = self
            .start
            .try_get_attribute(key)
            .map_err(|e| ManifestError::invalid_attribute(&self.name(), key, value, e))?
            .is_some();
        if !exists {
            self.start.push_attribute((key, value));
            return Ok(());
        }

        let existing = self
            .start
            .attributes()
            .map(|attr| attr.map(|a| (a.key.as_ref().to_vec(), a.value.into_owned())))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ManifestError::invalid_attribute(&self.name(), key, value, e))?;

        self.start.clear_attributes();
        for (k, v) in existing {
            if k == key.as_bytes() {
                self.start.push_attribute((key, value));
            } else {
                self.start.push_attribute(Attribute {
                    key: QName(&k),
                    value: Cow::Borrowed(&v),
                });
            }
        }
        Ok(())
    }

    pub fn append_child(&mut self, child: Element) {
        self.self_closing = false;
        self.children.push(Node::Element(child));
    }

    pub fn append_text(&mut self, text: &str) {
        self.self_closing = false;
        self.children
            .push(Node::Misc(Event::Text(BytesText::new(text).into_owned())));
    }

    /// Concatenated text children, unescaped.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Misc(Event::Text(text)) => text.unescape().ok().map(|t| t.into_owned()),
                _ => None,
            })
            .collect()
    }
}

/// A parsed manifest: the root element plus whatever surrounds it
/// (declaration, comments, whitespace).
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    pub nodes: Vec<Node>,
    root_index: usize,
    /// Value of the root's `xmlns` attribute, if any
    pub default_namespace: Option<String>,
}

impl ManifestDocument {
    pub(crate) fn new(nodes: Vec<Node>, root_index: usize) -> Result<Self> {
        let mut document = Self {
            nodes,
            root_index,
            default_namespace: None,
        };
        document.default_namespace = document.root().attribute("xmlns")?;
        Ok(document)
    }

    pub fn root(&self) -> &Element {
        match &self.nodes[self.root_index] {
            Node::Element(el) => el,
            Node::Misc(_) => unreachable!("root index always points at an element"),
        }
    }

    pub fn root_mut(&mut self) -> &mut Element {
        match &mut self.nodes[self.root_index] {
            Node::Element(el) => el,
            Node::Misc(_) => unreachable!("root index always points at an element"),
        }
    }
}
