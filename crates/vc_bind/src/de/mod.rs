//! Unmarshalling: markup events to bound instances.
//!
//! ## Menu
//!
//! - [`EventSource`]: pushes the events of one document into a [`ContentHandler`].
//! - [`Loader`]: the [`ContentHandler`] driving one unmarshal call.
//! - [`Attribute`]: a name and value pair delivered with a start tag.
//! - [`SourcePosition`]: where in the document a start tag was read.

// -----------------------------------------------------------------------------
// Modules

mod loader;

// -----------------------------------------------------------------------------
// Exports

pub use loader::Loader;

use alloc::string::String;
use core::fmt;

use crate::QName;
use crate::error::{AccessorError, BindError};
use crate::value::{BindValue, DeclaredType, Value};

// -----------------------------------------------------------------------------
// Attribute

/// An attribute of a start tag.
///
/// Type override values are expected in `{namespace}local` form; sources
/// that read prefixed markup resolve them first.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    #[inline]
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// SourcePosition

/// A line and column in the document, both counted from 1. `0:0` stands for unknown.
///
/// A member with a [`Location`](crate::Directive::Location) directive
/// receives the position of the start tag its instance was read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl BindValue for SourcePosition {
    #[inline]
    fn declared_type() -> DeclaredType {
        DeclaredType::single::<Self>()
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::object(*self)
    }

    #[inline]
    fn from_value(value: Value) -> Result<Self, AccessorError> {
        value.into_object::<Self>()
    }

    /// A constructor parameter with no position read is `0:0`.
    #[inline]
    fn default_value() -> Value {
        Value::object(Self::default())
    }
}

// -----------------------------------------------------------------------------
// ContentHandler

/// Receiver of the events of one document, in document order.
///
/// An `Err` ends the document; the source must stop and return it.
pub trait ContentHandler {
    /// Announces the position of the next start tag. Sources that track
    /// positions call it right before every [`start_element`](Self::start_element).
    #[inline]
    fn position(&mut self, position: SourcePosition) {
        let _ = position;
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), BindError>;

    fn characters(&mut self, text: &str) -> Result<(), BindError>;

    fn end_element(&mut self, name: &QName) -> Result<(), BindError>;
}

// -----------------------------------------------------------------------------
// EventSource

/// A push source of markup events.
pub trait EventSource {
    /// Pushes every event of the document into `handler`.
    ///
    /// Failures of the source itself are reported as [`BindError::Source`].
    fn drive(&mut self, handler: &mut dyn ContentHandler) -> Result<(), BindError>;
}
