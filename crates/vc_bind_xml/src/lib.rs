#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod sink;
mod source;


// -----------------------------------------------------------------------------
// Exports

pub use sink::XmlSink;
pub use source::XmlSource;

use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use vc_bind::{BindError, BindValue, BindingContext, EventHandler, LoadOutcome, SinkError, Value};

// -----------------------------------------------------------------------------
// Convenience

fn into_text(bytes: Vec<u8>) -> Result<String, BindError> {
    String::from_utf8(bytes).map_err(|error| BindError::Sink(SinkError(error.to_string())))
}

/// Marshals `value` to an XML document, declaration included.
///
/// # Examples
///
/// ```
/// use vc_bind::meta::InlineReader;
/// use vc_bind::nav::{TypeHandle, TypeTable};
/// use vc_bind::{BindingContext, ContextOptions, Directive, impl_bind_object};
///
/// #[derive(Clone, Default, Debug, PartialEq)]
/// struct Note { to: String, body: String }
/// impl_bind_object!(Note);
///
/// let mut table = TypeTable::new();
/// table
///     .class::<Note>()
///     .factory(Note::default)
///     .class_directive(Directive::root("note"))
///     .field("to", |n| &n.to, |n| &mut n.to)
///     .directive(Directive::attribute("to"))
///     .field("body", |n| &n.body, |n| &mut n.body)
///     .finish();
/// let ctx = BindingContext::new(
///     &table,
///     &mut InlineReader::new(),
///     &[TypeHandle::of::<Note>()],
///     ContextOptions::new(),
/// )
/// .unwrap();
///
/// let note = Note { to: "Ann".into(), body: "Tea at 5 & bring cake".into() };
/// let xml = vc_bind_xml::to_string(&ctx, &note).unwrap();
/// assert!(xml.ends_with(r#"<note to="Ann"><body>Tea at 5 &amp; bring cake</body></note>"#));
///
/// let back: Note = vc_bind_xml::from_str_as(&ctx, &xml).unwrap();
/// assert_eq!(back, note);
/// ```
pub fn to_string<T: Any>(ctx: &BindingContext, value: &T) -> Result<String, BindError> {
    let mut sink = XmlSink::new(Vec::new());
    sink.declaration()?;
    ctx.marshal(value, &mut sink)?;
    into_text(sink.into_inner())
}

/// Like [`to_string`], with nested elements indented by four spaces.
pub fn to_string_pretty<T: Any>(ctx: &BindingContext, value: &T) -> Result<String, BindError> {
    let mut sink = XmlSink::pretty(Vec::new(), 4);
    sink.declaration()?;
    ctx.marshal(value, &mut sink)?;
    into_text(sink.into_inner())
}

/// Marshals `value` into `writer`, without a declaration.
pub fn to_writer<W: std::io::Write, T: Any>(
    ctx: &BindingContext,
    value: &T,
    writer: W,
) -> Result<W, BindError> {
    let mut sink = XmlSink::new(writer);
    ctx.marshal(value, &mut sink)?;
    Ok(sink.into_inner())
}

/// Unmarshals a document whose root element names a bound class.
pub fn from_str(ctx: &BindingContext, xml: &str) -> Result<Value, BindError> {
    ctx.unmarshal(&mut XmlSource::new(xml))
}

/// Unmarshals a document, reporting recoverable problems to `handler`.
pub fn from_str_with(
    ctx: &BindingContext,
    xml: &str,
    handler: &mut dyn EventHandler,
) -> Result<LoadOutcome, BindError> {
    ctx.unmarshal_with(&mut XmlSource::new(xml), handler)
}

/// Unmarshals a document as a `T`, whatever its root element is named.
pub fn from_str_as<T: BindValue>(ctx: &BindingContext, xml: &str) -> Result<T, BindError> {
    ctx.unmarshal_as(&mut XmlSource::new(xml))
}
