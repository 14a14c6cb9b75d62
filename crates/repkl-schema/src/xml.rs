//! Minimal namespace-aware element tree over `quick-xml`, plus writer helpers.
//!
//! Manifests are small, so each document is read into an owned tree and
//! queried by (namespace, local name), mirroring how the manifests are laid
//! out rather than streaming them.

use crate::types::UserText;
use crate::ManifestError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::Writer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn matches(&self, ns: Option<&str>, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == ns
    }

    pub fn child(&self, ns: Option<&str>, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.matches(ns, name))
    }

    /// All descendants (excluding `self`) with the given name, in document order.
    pub fn descendants(&self, ns: Option<&str>, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(ns, name, &mut found);
        found
    }

    fn collect_descendants<'a>(
        &'a self,
        ns: Option<&str>,
        name: &str,
        out: &mut Vec<&'a Element>,
    ) {
        for c in &self.children {
            if c.matches(ns, name) {
                out.push(c);
            }
            c.collect_descendants(ns, name, out);
        }
    }

    pub fn first_descendant(&self, ns: Option<&str>, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|c| {
            if c.matches(ns, name) {
                Some(c)
            } else {
                c.first_descendant(ns, name)
            }
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn required_child(
        &self,
        ns: Option<&str>,
        name: &'static str,
        document: &'static str,
    ) -> Result<&Element, ManifestError> {
        self.child(ns, name).ok_or(ManifestError::MissingField {
            document,
            field: name,
        })
    }

    pub fn user_text(&self) -> UserText {
        UserText {
            text: self.text.clone(),
            language: self.attribute("language").map(str::to_owned),
        }
    }
}

/// Parse a whole document into its root element.
pub(crate) fn parse_document(input: &[u8]) -> Result<Element, ManifestError> {
    let text = std::str::from_utf8(input)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    build_tree(text)?.ok_or(ManifestError::EmptyDocument)
}

fn build_tree(input: &str) -> Result<Option<Element>, ManifestError> {
    let mut reader = NsReader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = match resolved {
            ResolveResult::Bound(ns) => {
                Some(String::from_utf8_lossy(ns.as_ref()).into_owned())
            }
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(ManifestError::UndeclaredPrefix(
                    String::from_utf8_lossy(&prefix).into_owned(),
                ));
            }
        };
        match event {
            Event::Start(e) => stack.push(open_element(namespace, &e)?),
            Event::Empty(e) => {
                let element = open_element(namespace, &e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(t) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(root)
}

fn open_element(
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<Element, quick_xml::Error> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        attributes.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

pub(crate) type XmlWriter = Writer<Vec<u8>>;

/// Start a pretty-printed document with a UTF-8 declaration.
pub(crate) fn new_document() -> Result<XmlWriter, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

pub(crate) fn finish_document(writer: XmlWriter) -> Vec<u8> {
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    bytes
}

pub(crate) fn start(
    w: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(name);
    for attr in attributes {
        start.push_attribute(*attr);
    }
    w.write_event(Event::Start(start))?;
    Ok(())
}

pub(crate) fn end(w: &mut XmlWriter, name: &str) -> Result<(), quick_xml::Error> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub(crate) fn empty(
    w: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(name);
    for attr in attributes {
        start.push_attribute(*attr);
    }
    w.write_event(Event::Empty(start))?;
    Ok(())
}

pub(crate) fn text_element(
    w: &mut XmlWriter,
    name: &str,
    text: &str,
    language: Option<&str>,
) -> Result<(), quick_xml::Error> {
    match language {
        Some(lang) => start(w, name, &[("language", lang)])?,
        None => start(w, name, &[])?,
    }
    w.write_event(Event::Text(BytesText::new(text)))?;
    end(w, name)
}

pub(crate) fn user_text_element(
    w: &mut XmlWriter,
    name: &str,
    value: &UserText,
) -> Result<(), quick_xml::Error> {
    text_element(w, name, &value.text, value.language())
}
