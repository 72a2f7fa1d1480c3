//! A mutable XML document kept as a flat xml-rs event list.
//!
//! Elements are addressed by [`NodeId`], the index of their start event.
//! Appending a child only inserts events before the parent's end event, so
//! handles to the parent, its ancestors and anything that precedes the
//! insertion point stay valid.

use std::borrow::Cow;

use xml::attribute::Attribute;
use xml::name::OwnedName;
use xml::namespace::{Namespace, NS_EMPTY_URI, NS_NO_PREFIX};
use xml::reader::XmlEvent;

use crate::c14n;
use crate::error::{Error, Result};

lazy_static::lazy_static! {
    static ref LINE_ENDINGS: regex::Regex = regex::Regex::new(r"\r\n?").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    events: Vec<XmlEvent>,
}

impl Document {
    pub fn parse(source_xml: &str) -> Result<Self> {
        let source_xml = normalize_source(source_xml);
        let events = xml::reader::EventReader::new_with_config(
            source_xml.as_bytes(),
            xml::ParserConfig::new()
                .ignore_comments(false)
                .trim_whitespace(false)
                .coalesce_characters(true)
                .ignore_root_level_whitespace(true),
        )
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Xml(format!("unable to decode XML: {}", e)))?;

        let document = Document { events };
        document.root()?;
        Ok(document)
    }

    pub fn events(&self) -> &[XmlEvent] {
        &self.events
    }

    pub fn root(&self) -> Result<NodeId> {
        self.events
            .iter()
            .position(|e| matches!(e, XmlEvent::StartElement { .. }))
            .map(NodeId)
            .ok_or_else(|| Error::Xml("document has no root element".to_string()))
    }

    pub fn name(&self, node: NodeId) -> Option<&OwnedName> {
        match self.events.get(node.0) {
            Some(XmlEvent::StartElement { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Value of an unqualified attribute.
    pub fn attribute(&self, node: NodeId, local_name: &str) -> Option<&str> {
        match self.events.get(node.0) {
            Some(XmlEvent::StartElement { attributes, .. }) => attributes
                .iter()
                .find(|a| a.name.namespace.is_none() && a.name.local_name == local_name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let end = match self.end_of(node) {
            Some(end) => end,
            None => return vec![],
        };

        let mut level = 0usize;
        let mut children = vec![];
        for (i, evt) in self.events[..end].iter().enumerate().skip(node.0 + 1) {
            match evt {
                XmlEvent::StartElement { .. } => {
                    if level == 0 {
                        children.push(NodeId(i));
                    }
                    level += 1;
                }
                XmlEvent::EndElement { .. } => level -= 1,
                _ => {}
            }
        }
        children
    }

    pub fn find_child(&self, parent: NodeId, namespace: &str, local_name: &str) -> Option<NodeId> {
        self.children(parent).into_iter().find(|child| {
            self.name(*child).map_or(false, |name| {
                name.namespace.as_deref() == Some(namespace) && name.local_name == local_name
            })
        })
    }

    /// Concatenated text content of the element and its descendants.
    pub fn text(&self, node: NodeId) -> String {
        let end = match self.end_of(node) {
            Some(end) => end,
            None => return String::new(),
        };

        self.events[node.0..end]
            .iter()
            .filter_map(|evt| match evt {
                XmlEvent::Characters(s) | XmlEvent::CData(s) | XmlEvent::Whitespace(s) => {
                    Some(s.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Inserts `fragment` as the last child of `parent`.
    ///
    /// Only element and text events of the fragment are kept. Every inserted
    /// element gets the parent's in-scope namespaces plus the bindings its
    /// own name and attributes need, exactly as if it had been parsed there.
    pub fn append_child(&mut self, parent: NodeId, fragment: Vec<XmlEvent>) -> Result<NodeId> {
        let scope = match self.events.get(parent.0) {
            Some(XmlEvent::StartElement { namespace, .. }) => namespace.clone(),
            _ => return Err(Error::Xml(format!("node {} is not an element", parent.0))),
        };
        let end = self
            .end_of(parent)
            .ok_or_else(|| Error::Xml(format!("element {} is never closed", parent.0)))?;

        let mut scopes = vec![scope];
        let mut spliced = vec![];
        for evt in fragment {
            match evt {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    let mut namespace = scopes.last().cloned().unwrap_or_else(Namespace::empty);
                    bind(&mut namespace, &name, true);
                    for attr in &attributes {
                        bind(&mut namespace, &attr.name, false);
                    }
                    scopes.push(namespace.clone());
                    spliced.push(XmlEvent::StartElement {
                        name,
                        attributes,
                        namespace,
                    });
                }
                XmlEvent::EndElement { name } => {
                    if scopes.len() < 2 {
                        return Err(Error::Xml("unbalanced fragment".to_string()));
                    }
                    scopes.pop();
                    spliced.push(XmlEvent::EndElement { name });
                }
                evt @ (XmlEvent::Characters(_) | XmlEvent::CData(_) | XmlEvent::Whitespace(_)) => {
                    if scopes.len() > 1 {
                        spliced.push(evt);
                    }
                }
                _ => {}
            }
        }
        if scopes.len() != 1 || spliced.is_empty() {
            return Err(Error::Xml("fragment is not a single balanced element".to_string()));
        }

        self.events.splice(end..end, spliced);
        Ok(NodeId(end))
    }

    /// Canonical form of the whole document.
    pub fn canonicalize(&self) -> Result<String> {
        c14n::canonicalize_document(&self.events)
    }

    /// Canonical form of one element, rendered in its current position.
    pub fn canonicalize_node(&self, node: NodeId) -> Result<String> {
        c14n::canonicalize_subtree(&self.events, node.0)
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut output = Vec::new();
        let mut output_writer = xml::writer::EventWriter::new_with_config(
            &mut output,
            xml::writer::EmitterConfig {
                perform_indent: false,
                perform_escaping: false,
                write_document_declaration: true,
                autopad_comments: false,
                cdata_to_characters: false,
                line_separator: Cow::Borrowed("\n"),
                normalize_empty_elements: false,
                ..Default::default()
            },
        );

        let mut rendered = c14n::RenderedNamespaces::new();
        let no_bindings = Namespace::empty();

        for event in &self.events {
            let written = match event {
                XmlEvent::StartElement {
                    name,
                    attributes,
                    namespace,
                } => {
                    let declarations = rendered
                        .enter(namespace)
                        .into_iter()
                        .map(|(prefix, uri)| (prefix, c14n::escape_attribute_value(&uri)))
                        .collect::<Vec<_>>();
                    let values = attributes
                        .iter()
                        .map(|a| c14n::escape_attribute_value(&a.value))
                        .collect::<Vec<_>>();

                    output_writer.write(xml::writer::XmlEvent::StartElement {
                        name: name.borrow(),
                        attributes: Cow::Owned(
                            declarations
                                .iter()
                                .map(|(prefix, uri)| Attribute {
                                    name: c14n::declaration_name(prefix),
                                    value: uri,
                                })
                                .chain(attributes.iter().zip(&values).map(|(a, value)| {
                                    Attribute {
                                        name: a.name.borrow(),
                                        value,
                                    }
                                }))
                                .collect(),
                        ),
                        namespace: Cow::Borrowed(&no_bindings),
                    })
                }
                XmlEvent::EndElement { name } => {
                    rendered.leave();
                    output_writer.write(xml::writer::XmlEvent::EndElement {
                        name: Some(name.borrow()),
                    })
                }
                XmlEvent::Characters(data) | XmlEvent::Whitespace(data) => output_writer
                    .write(xml::writer::XmlEvent::Characters(&c14n::escape_text(data))),
                evt => match evt.as_writer_event() {
                    Some(e) => output_writer.write(e),
                    None => Ok(()),
                },
            };
            written.map_err(|e| Error::Xml(format!("unable to encode XML: {}", e)))?;
        }
        drop(output_writer);

        String::from_utf8(output).map_err(|e| Error::Xml(e.to_string()))
    }

    fn end_of(&self, node: NodeId) -> Option<usize> {
        if !matches!(self.events.get(node.0), Some(XmlEvent::StartElement { .. })) {
            return None;
        }

        let mut level = 0usize;
        for (i, evt) in self.events.iter().enumerate().skip(node.0) {
            match evt {
                XmlEvent::StartElement { .. } => level += 1,
                XmlEvent::EndElement { .. } => {
                    level -= 1;
                    if level == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Adds the binding `name` relies on, unless it is already in scope.
fn bind(namespace: &mut Namespace, name: &OwnedName, is_element: bool) {
    match (&name.prefix, &name.namespace) {
        (Some(prefix), Some(uri)) => {
            namespace.0.insert(prefix.clone(), uri.clone());
        }
        (None, Some(uri)) if is_element => {
            namespace.0.insert(NS_NO_PREFIX.to_string(), uri.clone());
        }
        (None, None) if is_element => {
            namespace
                .0
                .insert(NS_NO_PREFIX.to_string(), NS_EMPTY_URI.to_string());
        }
        _ => {}
    }
}

/// End-of-line handling and normalization of literal whitespace in
/// attribute values, neither of which the xml-rs reader performs. Whitespace
/// written as character references is left alone, since it only becomes a
/// character once xml-rs resolves it.
fn normalize_source(source_xml: &str) -> String {
    let source = LINE_ENDINGS.replace_all(source_xml, "\n");
    let mut output = String::with_capacity(source.len());
    let mut rest: &str = &source;

    while let Some(start) = rest.find('<') {
        output.push_str(&rest[..start]);
        rest = &rest[start..];

        let length = if rest.starts_with("<!--") {
            skip_until(rest, 4, "-->")
        } else if rest.starts_with("<![CDATA[") {
            skip_until(rest, 9, "]]>")
        } else if rest.starts_with("<?") {
            skip_until(rest, 2, "?>")
        } else if rest.starts_with("<!") {
            declaration_length(rest)
        } else {
            let length = copy_tag(rest, &mut output);
            rest = &rest[length..];
            continue;
        };

        output.push_str(&rest[..length]);
        rest = &rest[length..];
    }

    output.push_str(rest);
    output
}

fn skip_until(markup: &str, open: usize, terminator: &str) -> usize {
    markup
        .get(open..)
        .and_then(|body| body.find(terminator))
        .map(|i| open + i + terminator.len())
        .unwrap_or(markup.len())
}

/// Length of a `<!DOCTYPE ...>` style declaration, internal subset included.
fn declaration_length(markup: &str) -> usize {
    let mut quote = None;
    let mut depth = 0usize;
    for (i, c) in markup.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => return i + 1,
            _ => {}
        }
    }
    markup.len()
}

/// Copies a start or end tag into `output`, turning tabs and line feeds
/// inside attribute values into spaces. Returns the length of the tag.
fn copy_tag(markup: &str, output: &mut String) -> usize {
    let mut quote = None;
    for (i, c) in markup.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), '\t') | (Some(_), '\n') => {
                output.push(' ');
                continue;
            }
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => {
                output.push(c);
                return i + 1;
            }
            _ => {}
        }
        output.push(c);
    }
    markup.len()
}

#[cfg(test)]
mod tests {
    use xml::reader::XmlEvent;

    use super::Document;

    fn fragment(source_xml: &str) -> Vec<XmlEvent> {
        Document::parse(source_xml).unwrap().events().to_vec()
    }

    #[test]
    fn append_child_goes_last_and_keeps_handles() {
        let mut document = Document::parse(r#"<Root xmlns="urn:test"><First/></Root>"#).unwrap();
        let root = document.root().unwrap();
        let first = document.children(root)[0];

        let appended = document
            .append_child(root, fragment(r#"<Second xmlns="urn:test" n="2">2</Second>"#))
            .unwrap();

        assert_eq!(document.children(root), vec![first, appended]);
        assert_eq!(document.name(first).unwrap().local_name, "First");
        assert_eq!(document.name(appended).unwrap().local_name, "Second");
        assert_eq!(document.attribute(appended, "n"), Some("2"));
        assert_eq!(document.attribute(appended, "missing"), None);
        assert_eq!(document.text(appended), "2");
    }

    #[test]
    fn appended_elements_inherit_namespaces() {
        let mut document =
            Document::parse(r#"<r:Root xmlns:r="urn:root" xmlns:x="urn:x"/>"#).unwrap();
        let root = document.root().unwrap();
        let outer = document
            .append_child(root, fragment(r#"<Outer xmlns="urn:inner"/>"#))
            .unwrap();
        let inner = document
            .append_child(outer, fragment(r#"<Inner xmlns="urn:inner" a="1"/>"#))
            .unwrap();

        assert_eq!(
            document.canonicalize_node(inner).unwrap(),
            r#"<Inner xmlns="urn:inner" xmlns:r="urn:root" xmlns:x="urn:x" a="1"></Inner>"#
        );
        assert_eq!(
            document.canonicalize().unwrap(),
            r#"<r:Root xmlns:r="urn:root" xmlns:x="urn:x"><Outer xmlns="urn:inner"><Inner a="1"></Inner></Outer></r:Root>"#
        );
    }

    #[test]
    fn appended_unqualified_element_leaves_default_namespace() {
        let mut document = Document::parse(r#"<Root xmlns="urn:test"/>"#).unwrap();
        let root = document.root().unwrap();
        document.append_child(root, fragment("<Plain/>")).unwrap();

        assert_eq!(
            document.canonicalize().unwrap(),
            r#"<Root xmlns="urn:test"><Plain xmlns=""></Plain></Root>"#
        );
    }

    #[test]
    fn serialized_document_reparses_identically() {
        let mut document = Document::parse(r#"<Root xmlns="urn:test" a="&amp;"/>"#).unwrap();
        let root = document.root().unwrap();
        document
            .append_child(root, fragment(r#"<Child xmlns="urn:other">1 &lt; 2</Child>"#))
            .unwrap();

        let reparsed = Document::parse(&document.to_xml_string().unwrap()).unwrap();
        assert_eq!(reparsed.canonicalize().unwrap(), document.canonicalize().unwrap());
        assert_eq!(
            reparsed.canonicalize().unwrap(),
            r#"<Root xmlns="urn:test" a="&amp;"><Child xmlns="urn:other">1 &lt; 2</Child></Root>"#
        );
    }

    #[test]
    fn serialization_keeps_namespace_undeclaration_and_references() {
        let source_xml = "<a xmlns=\"urn:a\" v=\"x&#xA;y&#x9;z\"><b xmlns=\"\">x&#xD;y</b></a>";
        let document = Document::parse(source_xml).unwrap();

        let serialized = document.to_xml_string().unwrap();
        assert!(serialized.ends_with(
            "<a xmlns=\"urn:a\" v=\"x&#xA;y&#x9;z\"><b xmlns=\"\">x&#xD;y</b></a>"
        ));

        let reparsed = Document::parse(&serialized).unwrap();
        assert_eq!(reparsed.canonicalize().unwrap(), document.canonicalize().unwrap());
    }

    #[test]
    fn normalizes_literal_whitespace_only_in_attribute_values() {
        let document = Document::parse(
            "<?xml version=\"1.0\"?>\r\n<!DOCTYPE a>\r\n<a b=\"1\r\n2\t3\" c='>'>\t<!-- x\ty -->x\r\ny</a>",
        )
        .unwrap();
        let root = document.root().unwrap();

        assert_eq!(document.attribute(root, "b"), Some("1 2 3"));
        assert_eq!(document.attribute(root, "c"), Some(">"));
        assert_eq!(document.text(root), "\tx\ny");
    }

    #[test]
    fn rejects_documents_without_root() {
        assert!(Document::parse("").is_err());
        assert!(Document::parse("<a>").is_err());
    }

    #[test]
    fn append_to_non_element_fails() {
        let mut document = Document::parse("<a>text</a>").unwrap();
        let text = document.root().unwrap().index() + 1;
        assert!(document
            .append_child(super::NodeId(text), fragment("<b/>"))
            .is_err());

        let root = document.root().unwrap();
        assert!(document.append_child(root, vec![]).is_err());
    }
}
