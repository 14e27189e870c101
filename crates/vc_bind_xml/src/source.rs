use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName as RawName, ResolveResult};
use vc_bind::de::{Attribute, ContentHandler, SourcePosition};
use vc_bind::{BindError, EventSource, QName};

// -----------------------------------------------------------------------------
// XmlSource

/// An [`EventSource`] reading XML text.
///
/// Element and attribute names are resolved against the namespace
/// declarations in scope; the declarations themselves are not passed on.
/// Type override values are resolved the same way and handed over in
/// `{namespace}local` form. Every start tag is preceded by its position.
pub struct XmlSource<'a> {
    reader: NsReader<&'a [u8]>,
    lines: LineCounter<'a>,
}

impl<'a> XmlSource<'a> {
    pub fn new(xml: &'a str) -> Self {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            lines: LineCounter::new(xml.as_bytes()),
        }
    }

    fn error(&self, what: impl core::fmt::Display) -> BindError {
        BindError::Source(format!(
            "{what} (at byte {})",
            self.reader.buffer_position()
        ))
    }

    fn resolve(&self, name: RawName<'_>, attribute: bool) -> Result<QName, BindError> {
        let (namespace, local) = if attribute {
            self.reader.resolve_attribute(name)
        } else {
            self.reader.resolve_element(name)
        };
        let local = self.text(local.into_inner())?;
        match namespace {
            ResolveResult::Bound(Namespace(uri)) => Ok(QName::new(self.text(uri)?, local)),
            ResolveResult::Unbound => Ok(QName::local(local)),
            ResolveResult::Unknown(prefix) => Err(self.error(format!(
                "prefix `{}` is not bound",
                String::from_utf8_lossy(&prefix)
            ))),
        }
    }

    fn text<'t>(&self, bytes: &'t [u8]) -> Result<&'t str, BindError> {
        core::str::from_utf8(bytes).map_err(|error| self.error(error))
    }

    fn attributes(&self, start: &BytesStart<'_>) -> Result<Vec<Attribute>, BindError> {
        let marker = QName::type_override();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|error| self.error(error))?;
            let key = attribute.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let name = self.resolve(attribute.key, true)?;
            let value = attribute
                .unescape_value()
                .map_err(|error| self.error(error))?;
            let value = if name == marker {
                self.resolve(RawName(value.trim().as_bytes()), false)?
                    .to_string()
            } else {
                value.into_owned()
            };
            attributes.push(Attribute::new(name, value));
        }
        Ok(attributes)
    }
}

impl EventSource for XmlSource<'_> {
    fn drive(&mut self, handler: &mut dyn ContentHandler) -> Result<(), BindError> {
        let mut open: Vec<QName> = Vec::new();
        loop {
            let offset = usize::try_from(self.reader.buffer_position()).unwrap_or(usize::MAX);
            match self.reader.read_event() {
                Ok(Event::Start(start)) => {
                    let name = self.resolve(start.name(), false)?;
                    let attributes = self.attributes(&start)?;
                    handler.position(self.lines.advance(offset));
                    handler.start_element(&name, &attributes)?;
                    open.push(name);
                }
                Ok(Event::End(_)) => {
                    let Some(name) = open.pop() else {
                        return Err(self.error("unbalanced end tag"));
                    };
                    handler.end_element(&name)?;
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(|error| self.error(error))?;
                    handler.characters(&text)?;
                }
                Ok(Event::CData(data)) => {
                    let text: Cow<'_, str> = String::from_utf8_lossy(&data);
                    handler.characters(&text)?;
                }
                Ok(Event::Eof) => {
                    if !open.is_empty() {
                        return Err(self.error("document ended inside an element"));
                    }
                    return Ok(());
                }
                // declarations, comments and processing instructions
                Ok(_) => {}
                Err(error) => return Err(self.error(error)),
            }
        }
    }
}

// -----------------------------------------------------------------------------
// LineCounter

/// Turns increasing byte offsets into lines and columns. Columns count
/// characters.
struct LineCounter<'a> {
    bytes: &'a [u8],
    scanned: usize,
    line: u32,
    column: u32,
}

impl<'a> LineCounter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            scanned: 0,
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self, offset: usize) -> SourcePosition {
        let end = offset.min(self.bytes.len());
        for &byte in self.bytes.get(self.scanned..end).unwrap_or_default() {
            if byte == b'\n' {
                self.line = self.line.saturating_add(1);
                self.column = 1;
            } else if byte & 0xC0 != 0x80 {
                // not a utf-8 continuation byte
                self.column = self.column.saturating_add(1);
            }
        }
        self.scanned = self.scanned.max(end);
        SourcePosition::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::XmlSource;
    use alloc::string::String;
    use alloc::vec::Vec;
    use vc_bind::de::{Attribute, ContentHandler, SourcePosition};
    use vc_bind::{BindError, EventSource, QName};

    #[derive(Default)]
    struct Trace(Vec<String>);

    /// Start tags with the position announced for them.
    #[derive(Default)]
    struct Starts {
        next: Option<SourcePosition>,
        seen: Vec<(String, SourcePosition)>,
    }

    impl ContentHandler for Starts {
        fn position(&mut self, position: SourcePosition) {
            self.next = Some(position);
        }

        fn start_element(&mut self, name: &QName, _: &[Attribute]) -> Result<(), BindError> {
            let position = self.next.take().unwrap_or_default();
            self.seen.push((name.to_string(), position));
            Ok(())
        }

        fn characters(&mut self, _: &str) -> Result<(), BindError> {
            Ok(())
        }

        fn end_element(&mut self, _: &QName) -> Result<(), BindError> {
            Ok(())
        }
    }

    impl ContentHandler for Trace {
        fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), BindError> {
            self.0.push(format!("+{name}"));
            for attribute in attributes {
                self.0.push(format!("@{}={}", attribute.name, attribute.value));
            }
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<(), BindError> {
            self.0.push(format!("'{text}'"));
            Ok(())
        }

        fn end_element(&mut self, name: &QName) -> Result<(), BindError> {
            self.0.push(format!("-{name}"));
            Ok(())
        }
    }

    #[test]
    fn names_and_type_overrides_are_resolved() {
        let xml = r#"<?xml version="1.0"?><a:pet xmlns:a="urn:zoo" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="a:dog" size="1 &amp; 2"><![CDATA[<raw>]]></a:pet>"#;
        let mut trace = Trace::default();
        XmlSource::new(xml).drive(&mut trace).unwrap();
        assert_eq!(
            trace.0,
            [
                "+{urn:zoo}pet",
                "@{http://www.w3.org/2001/XMLSchema-instance}type={urn:zoo}dog",
                "@size=1 & 2",
                "'<raw>'",
                "-{urn:zoo}pet",
            ]
        );
    }

    #[test]
    fn empty_elements_are_expanded() {
        let mut trace = Trace::default();
        XmlSource::new("<a><b/></a>").drive(&mut trace).unwrap();
        assert_eq!(trace.0, ["+a", "+b", "-b", "-a"]);
    }

    #[test]
    fn malformed_documents_are_source_errors() {
        let mut trace = Trace::default();
        let result = XmlSource::new("<a><b></a>").drive(&mut trace);
        assert!(matches!(result, Err(BindError::Source(_))));

        let result = XmlSource::new("<p:a/>").drive(&mut Trace::default());
        assert!(matches!(result, Err(BindError::Source(_))));
    }

    #[test]
    fn start_tags_carry_their_line_and_column() {
        let xml = "<?xml version=\"1.0\"?>\n<list>\n  <item/><item>é</item>\n\t<!-- x -->\n  <last a=\"1\"\n/>\n</list>";
        let mut starts = Starts::default();
        XmlSource::new(xml).drive(&mut starts).unwrap();
        let seen: Vec<(&str, u32, u32)> = starts
            .seen
            .iter()
            .map(|(name, at)| (name.as_str(), at.line, at.column))
            .collect();
        assert_eq!(
            seen,
            [
                ("list", 2, 1),
                ("item", 3, 3),
                ("item", 3, 10),
                ("last", 5, 3),
            ]
        );
    }
}
