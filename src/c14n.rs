//! Canonical XML 1.0 (inclusive, without comments) over xml-rs event streams.
//!
//! A subtree is rendered with the namespace context it has inside its
//! document, so the result depends on where the element is attached.
//! Events are expected to come from [`Document::parse`](crate::Document::parse),
//! which applies the line-ending and attribute-value normalization of the
//! XML data model before xml-rs sees the text.

use std::borrow::Cow;
use std::collections::BTreeMap;

use xml::attribute::{Attribute, OwnedAttribute};
use xml::name::Name;
use xml::namespace::{Namespace, NS_EMPTY_URI, NS_XMLNS_PREFIX, NS_XML_PREFIX};
use xml::reader::XmlEvent;

use crate::error::{Error, Result};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Attribute value escaping. Tab, line feed and carriage return left in a
/// value after normalization came from character references.
pub(crate) fn escape_attribute_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push_str("&#x9;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn escape_text(data: &str) -> String {
    let mut escaped = String::with_capacity(data.len());
    for c in data.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#xD;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Namespace bindings already rendered by the enclosing output elements.
///
/// xml-rs never writes `xmlns=""`, so the declarations are rendered as
/// attributes instead of through the writer's namespace stack.
pub(crate) struct RenderedNamespaces {
    scopes: Vec<BTreeMap<String, String>>,
}

impl RenderedNamespaces {
    pub(crate) fn new() -> Self {
        RenderedNamespaces {
            scopes: vec![BTreeMap::new()],
        }
    }

    /// Declarations an element with the in-scope `namespace` has to carry,
    /// default namespace first, then by prefix.
    pub(crate) fn enter(&mut self, namespace: &Namespace) -> Vec<(String, String)> {
        let mut rendered = self.scopes.last().cloned().unwrap_or_default();
        let mut declarations = vec![];
        for (prefix, uri) in &namespace.0 {
            if prefix.as_str() == NS_XML_PREFIX || prefix.as_str() == NS_XMLNS_PREFIX {
                continue;
            }
            if rendered.get(prefix).map(String::as_str).unwrap_or(NS_EMPTY_URI) != uri.as_str() {
                rendered.insert(prefix.clone(), uri.clone());
                declarations.push((prefix.clone(), uri.clone()));
            }
        }
        self.scopes.push(rendered);
        declarations
    }

    pub(crate) fn leave(&mut self) {
        self.scopes.pop();
    }
}

pub(crate) fn declaration_name(prefix: &str) -> Name<'_> {
    if prefix.is_empty() {
        Name {
            local_name: NS_XMLNS_PREFIX,
            namespace: None,
            prefix: None,
        }
    } else {
        Name {
            local_name: prefix,
            namespace: None,
            prefix: Some(NS_XMLNS_PREFIX),
        }
    }
}

fn is_xml_attribute(a: &&OwnedAttribute) -> bool {
    a.name.namespace.as_deref() == Some(XML_NAMESPACE)
}

/// Canonical form of a whole document.
pub fn canonicalize_document(events: &[XmlEvent]) -> Result<String> {
    canonicalize(events, None)
}

/// Canonical form of the element whose start event sits at `apex`.
pub fn canonicalize_subtree(events: &[XmlEvent], apex: usize) -> Result<String> {
    match events.get(apex) {
        Some(XmlEvent::StartElement { .. }) => canonicalize(events, Some(apex)),
        _ => Err(Error::Canonicalization(format!(
            "event {} is not the start of an element",
            apex
        ))),
    }
}

fn canonicalize(events: &[XmlEvent], apex: Option<usize>) -> Result<String> {
    let offset = apex.unwrap_or(0);
    let mut output = Vec::new();
    let mut output_writer = xml::writer::EventWriter::new_with_config(
        &mut output,
        xml::writer::EmitterConfig {
            perform_indent: false,
            perform_escaping: false,
            write_document_declaration: false,
            autopad_comments: false,
            cdata_to_characters: true,
            line_separator: Cow::Borrowed("\n"),
            normalize_empty_elements: false,
            ..Default::default()
        },
    );

    let mut level: usize = 0;
    let mut seen_root = false;
    let mut xml_attrs: Vec<Vec<&OwnedAttribute>> = vec![];
    let mut rendered = RenderedNamespaces::new();
    let no_bindings = Namespace::empty();

    for (i, event) in events.iter().enumerate() {
        let written = match event {
            XmlEvent::StartDocument { .. } | XmlEvent::EndDocument => Ok(()),
            XmlEvent::ProcessingInstruction { name, data } => {
                let pi = xml::writer::XmlEvent::ProcessingInstruction {
                    name,
                    data: data.as_deref(),
                };
                if i < offset {
                    Ok(())
                } else if level > 0 {
                    output_writer.write(pi)
                } else if seen_root {
                    output_writer
                        .write(xml::writer::XmlEvent::Characters("\n"))
                        .and_then(|_| output_writer.write(pi))
                } else {
                    output_writer
                        .write(pi)
                        .and_then(|_| output_writer.write(xml::writer::XmlEvent::Characters("\n")))
                }
            }
            XmlEvent::StartElement {
                name,
                attributes,
                namespace,
            } => {
                let own_xml_attrs = attributes.iter().filter(is_xml_attribute).collect::<Vec<_>>();

                let written = if i >= offset {
                    let declarations = rendered
                        .enter(namespace)
                        .into_iter()
                        .map(|(prefix, uri)| (prefix, escape_attribute_value(&uri)))
                        .collect::<Vec<_>>();

                    let mut mapped_attr = attributes
                        .iter()
                        .map(|a| (a.name.borrow(), escape_attribute_value(&a.value)))
                        .collect::<Vec<_>>();

                    // xml:* attributes are inherited onto the apex, nearest ancestor first
                    if level == 0 {
                        for attr in xml_attrs.iter().rev().flatten() {
                            let present = mapped_attr.iter().any(|(n, _)| {
                                n.namespace == Some(XML_NAMESPACE)
                                    && n.local_name == attr.name.local_name
                            });
                            if !present {
                                mapped_attr
                                    .push((attr.name.borrow(), escape_attribute_value(&attr.value)));
                            }
                        }
                    }

                    mapped_attr.sort_by(|a, b| {
                        (a.0.namespace.unwrap_or_default(), a.0.local_name)
                            .cmp(&(b.0.namespace.unwrap_or_default(), b.0.local_name))
                    });

                    level += 1;
                    output_writer.write(xml::writer::XmlEvent::StartElement {
                        name: name.borrow(),
                        attributes: Cow::Owned(
                            declarations
                                .iter()
                                .map(|(prefix, uri)| Attribute {
                                    name: declaration_name(prefix),
                                    value: uri,
                                })
                                .chain(mapped_attr.iter().map(|a| Attribute {
                                    name: a.0,
                                    value: &a.1,
                                }))
                                .collect(),
                        ),
                        namespace: Cow::Borrowed(&no_bindings),
                    })
                } else {
                    Ok(())
                };

                xml_attrs.push(own_xml_attrs);
                written
            }
            XmlEvent::EndElement { name } => {
                xml_attrs.pop();

                if i >= offset {
                    level = level.checked_sub(1).ok_or_else(|| {
                        Error::Canonicalization(format!("unbalanced end element at event {}", i))
                    })?;
                    rendered.leave();

                    let written = output_writer.write(xml::writer::XmlEvent::EndElement {
                        name: Some(name.borrow()),
                    });
                    if level == 0 {
                        seen_root = true;
                        if apex.is_some() {
                            written.map_err(|e| Error::Canonicalization(e.to_string()))?;
                            break;
                        }
                    }
                    written
                } else {
                    Ok(())
                }
            }
            XmlEvent::CData(data) | XmlEvent::Characters(data) | XmlEvent::Whitespace(data) => {
                if i >= offset && level > 0 {
                    output_writer.write(xml::writer::XmlEvent::Characters(&escape_text(data)))
                } else {
                    Ok(())
                }
            }
            // comments and doctype are not part of the canonical form
            _ => Ok(()),
        };

        written.map_err(|e| Error::Canonicalization(e.to_string()))?;
    }

    drop(output_writer);

    if level != 0 {
        return Err(Error::Canonicalization("unbalanced element structure".to_string()));
    }
    if !seen_root {
        return Err(Error::Canonicalization("no element to canonicalize".to_string()));
    }

    String::from_utf8(output).map_err(|e| Error::Canonicalization(e.to_string()))
}
