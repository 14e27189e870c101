use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::QName;
use crate::de::{Attribute, ContentHandler, EventSource};
use crate::error::{BindError, SinkError};
use crate::ser::EventSink;

// -----------------------------------------------------------------------------
// MarkupEvent

/// One recorded event. Attributes are folded into their start event and
/// adjacent text is merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupEvent {
    Start {
        name: QName,
        attributes: Vec<Attribute>,
    },
    Text(String),
    End(QName),
}

// -----------------------------------------------------------------------------
// EventRecorder

/// An [`EventSink`] that keeps what it receives, and an [`EventSource`] that
/// replays it.
///
/// Its [`Display`](fmt::Display) form is compact markup with names in
/// `{namespace}local` form, convenient in tests and logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventRecorder {
    events: Vec<MarkupEvent>,
}

impl EventRecorder {
    #[inline]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    #[inline]
    pub fn events(&self) -> &[MarkupEvent] {
        &self.events
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl From<Vec<MarkupEvent>> for EventRecorder {
    #[inline]
    fn from(events: Vec<MarkupEvent>) -> Self {
        Self { events }
    }
}

impl EventSink for EventRecorder {
    fn start_element(&mut self, name: &QName) -> Result<(), SinkError> {
        self.events.push(MarkupEvent::Start {
            name: name.clone(),
            attributes: Vec::new(),
        });
        Ok(())
    }

    fn attribute(&mut self, name: &QName, value: &str) -> Result<(), SinkError> {
        match self.events.last_mut() {
            Some(MarkupEvent::Start { attributes, .. }) => {
                attributes.push(Attribute {
                    name: name.clone(),
                    value: String::from(value),
                });
                Ok(())
            }
            _ => Err(SinkError(alloc::format!(
                "attribute `{name}` outside of a start tag"
            ))),
        }
    }

    fn text(&mut self, text: &str) -> Result<(), SinkError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.events.last_mut() {
            Some(MarkupEvent::Text(buffer)) => buffer.push_str(text),
            _ => self.events.push(MarkupEvent::Text(String::from(text))),
        }
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<(), SinkError> {
        self.events.push(MarkupEvent::End(name.clone()));
        Ok(())
    }
}

impl EventSource for EventRecorder {
    fn drive(&mut self, handler: &mut dyn ContentHandler) -> Result<(), BindError> {
        for event in &self.events {
            match event {
                MarkupEvent::Start { name, attributes } => handler.start_element(name, attributes)?,
                MarkupEvent::Text(text) => handler.characters(text)?,
                MarkupEvent::End(name) => handler.end_element(name)?,
            }
        }
        Ok(())
    }
}

fn escape(f: &mut fmt::Formatter<'_>, text: &str, quote: bool) -> fmt::Result {
    for c in text.chars() {
        match c {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' if quote => f.write_str("&quot;")?,
            c => fmt::Write::write_char(f, c)?,
        }
    }
    Ok(())
}

impl fmt::Display for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            match event {
                MarkupEvent::Start { name, attributes } => {
                    write!(f, "<{name}")?;
                    for attribute in attributes {
                        write!(f, " {}=\"", attribute.name)?;
                        escape(f, &attribute.value, true)?;
                        f.write_str("\"")?;
                    }
                    f.write_str(">")?;
                }
                MarkupEvent::Text(text) => escape(f, text, false)?,
                MarkupEvent::End(name) => write!(f, "</{name}>")?,
            }
        }
        Ok(())
    }
}
