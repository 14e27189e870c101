use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use vc_bind::ser::EventSink;
use vc_bind::{QName, SinkError, XSI_NAMESPACE};

// -----------------------------------------------------------------------------
// XmlSink

/// A start tag waiting for its attributes.
struct PendingStart {
    name: QName,
    namespaces: Vec<String>,
    attributes: Vec<(QName, String)>,
}

/// An element whose start tag has been written.
struct OpenElement {
    tag: String,
    /// `(uri, prefix)` pairs declared on the start tag.
    declared: Vec<(String, String)>,
}

/// An [`EventSink`] writing XML text.
///
/// Start tags are held back until their content begins, so elements without
/// content come out as empty-element tags. Namespaces are bound to `ns1`,
/// `ns2`, ... (the instance namespace to `xsi`) and declared on the first
/// start tag that needs them; the serializer announces the namespaces an
/// element's content uses on that element, which hoists the declarations up
/// to the outermost element of each namespace.
///
/// Type override values arrive in `{namespace}local` form and are written
/// with the prefix of their namespace.
pub struct XmlSink<W: io::Write> {
    writer: Writer<W>,
    pending: Option<PendingStart>,
    open: Vec<OpenElement>,
    /// Prefix of every namespace seen in the document, in order of first use.
    prefixes: Vec<(String, String)>,
}

impl<W: io::Write> XmlSink<W> {
    /// A sink writing compact XML to `inner`.
    pub fn new(inner: W) -> Self {
        Self::from_writer(Writer::new(inner))
    }

    /// A sink writing XML to `inner`, nested elements indented by `indent` spaces.
    pub fn pretty(inner: W, indent: usize) -> Self {
        Self::from_writer(Writer::new_with_indent(inner, b' ', indent))
    }

    fn from_writer(writer: Writer<W>) -> Self {
        Self {
            writer,
            pending: None,
            open: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Writes the XML declaration. Call it before the first element.
    pub fn declaration(&mut self) -> Result<(), SinkError> {
        let decl = BytesDecl::new("1.0", Some("UTF-8"), Some("yes"));
        self.write(Event::Decl(decl))
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), SinkError> {
        self.writer
            .write_event(event)
            .map_err(|error| SinkError(error.to_string()))
    }

    /// The prefix bound to `uri` in the current scope.
    fn in_scope(&self, uri: &str, declared: &[(String, String)]) -> Option<String> {
        declared
            .iter()
            .chain(self.open.iter().rev().flat_map(|open| open.declared.iter()))
            .find(|(bound, _)| bound == uri)
            .map(|(_, prefix)| prefix.clone())
    }

    /// The prefix of `uri`, declared in `declared` when it is not in scope yet.
    fn bind(&mut self, uri: &str, declared: &mut Vec<(String, String)>) -> String {
        if let Some(prefix) = self.in_scope(uri, declared) {
            return prefix;
        }
        let prefix = match self.prefixes.iter().find(|(bound, _)| bound == uri) {
            Some((_, prefix)) => prefix.clone(),
            None => {
                let prefix = if uri == XSI_NAMESPACE {
                    String::from("xsi")
                } else {
                    let count = self.prefixes.iter().filter(|(u, _)| u != XSI_NAMESPACE).count();
                    format!("ns{}", count + 1)
                };
                log::trace!("namespace `{uri}` bound to `{prefix}`");
                self.prefixes.push((String::from(uri), prefix.clone()));
                prefix
            }
        };
        declared.push((String::from(uri), prefix.clone()));
        prefix
    }

    fn qualify(&mut self, name: &QName, declared: &mut Vec<(String, String)>) -> String {
        if !name.is_qualified() {
            return String::from(name.local_name());
        }
        let prefix = self.bind(name.namespace(), declared);
        format!("{prefix}:{}", name.local_name())
    }

    /// Writes the held back start tag; as an empty-element tag when `empty`.
    fn flush(&mut self, empty: bool) -> Result<(), SinkError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let mut declared = Vec::new();
        for uri in &pending.namespaces {
            self.bind(uri, &mut declared);
        }
        let tag = self.qualify(&pending.name, &mut declared);

        let marker = QName::type_override();
        let mut attributes = Vec::with_capacity(pending.attributes.len());
        for (name, value) in &pending.attributes {
            let key = self.qualify(name, &mut declared);
            let value = if *name == marker {
                self.qualify(&QName::parse_clark(value), &mut declared)
            } else {
                value.clone()
            };
            attributes.push((key, value));
        }

        let mut start = BytesStart::new(tag.as_str());
        for (uri, prefix) in &declared {
            start.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
        }
        for (key, value) in &attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if empty {
            self.write(Event::Empty(start))
        } else {
            self.write(Event::Start(start))?;
            self.open.push(OpenElement { tag, declared });
            Ok(())
        }
    }

    fn pending_mut(&mut self, what: &str) -> Result<&mut PendingStart, SinkError> {
        self.pending
            .as_mut()
            .ok_or_else(|| SinkError(format!("{what} outside of a start tag")))
    }
}

impl<W: io::Write> EventSink for XmlSink<W> {
    fn start_element(&mut self, name: &QName) -> Result<(), SinkError> {
        self.flush(false)?;
        self.pending = Some(PendingStart {
            name: name.clone(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
        });
        Ok(())
    }

    fn namespace(&mut self, uri: &str) -> Result<(), SinkError> {
        let pending = self.pending_mut("namespace")?;
        if !pending.namespaces.iter().any(|known| known == uri) {
            pending.namespaces.push(String::from(uri));
        }
        Ok(())
    }

    fn attribute(&mut self, name: &QName, value: &str) -> Result<(), SinkError> {
        let pending = self.pending_mut("attribute")?;
        pending.attributes.push((name.clone(), String::from(value)));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), SinkError> {
        if text.is_empty() {
            return Ok(());
        }
        self.flush(false)?;
        self.write(Event::Text(BytesText::new(text)))
    }

    fn end_element(&mut self, name: &QName) -> Result<(), SinkError> {
        if self.pending.is_some() {
            return self.flush(true);
        }
        let Some(open) = self.open.pop() else {
            return Err(SinkError(format!("end of `{name}` without a start tag")));
        };
        self.write(Event::End(BytesEnd::new(open.tag.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::XmlSink;
    use alloc::string::String;
    use vc_bind::ser::EventSink;
    use vc_bind::{QName, XSI_NAMESPACE};

    fn written(sink: XmlSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn namespaces_are_declared_once_in_scope() {
        let mut sink = XmlSink::new(Vec::new());
        let root = QName::new("urn:a", "root");
        let child = QName::new("urn:a", "child");
        let other = QName::new("urn:b", "other");
        sink.start_element(&root).unwrap();
        sink.namespace("urn:a").unwrap();
        sink.start_element(&child).unwrap();
        sink.text("x").unwrap();
        sink.end_element(&child).unwrap();
        sink.start_element(&other).unwrap();
        sink.end_element(&other).unwrap();
        sink.end_element(&root).unwrap();
        assert_eq!(
            written(sink),
            r#"<ns1:root xmlns:ns1="urn:a"><ns1:child>x</ns1:child><ns2:other xmlns:ns2="urn:b"/></ns1:root>"#
        );
    }

    #[test]
    fn type_overrides_use_prefixes() {
        let mut sink = XmlSink::new(Vec::new());
        let pet = QName::local("pet");
        sink.start_element(&pet).unwrap();
        sink.attribute(&QName::new(XSI_NAMESPACE, "type"), "{urn:zoo}dog")
            .unwrap();
        sink.attribute(&QName::local("name"), "a < b").unwrap();
        sink.end_element(&pet).unwrap();
        assert_eq!(
            written(sink),
            r#"<pet xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:ns1="urn:zoo" xsi:type="ns1:dog" name="a &lt; b"/>"#
        );
    }

    #[test]
    fn attributes_need_a_start_tag() {
        let mut sink = XmlSink::new(Vec::new());
        assert!(sink.attribute(&QName::local("a"), "v").is_err());
        assert!(sink.end_element(&QName::local("a")).is_err());
    }
}
