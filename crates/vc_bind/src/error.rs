//! Error types and the error sink used while building a model.
//!
//! ## Menu
//!
//! - [`Location`]: where a declaration was made, chained to its owner.
//! - [`ModelError`] / [`ModelErrors`]: problems found while building or linking a model.
//!   They are always recoverable: a fallback classification is applied and building continues.
//! - [`ErrorSink`] / [`ErrorCollector`]: the channel metadata readers and the builder report through.
//! - [`AccessorError`], [`ConstructionError`], [`BindError`]: runtime errors of marshal/unmarshal.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::panic;
use std::sync::Mutex;

use thiserror::Error;

use crate::QName;
use crate::meta::DirectiveKind;

// -----------------------------------------------------------------------------
// Location

/// Source location of a declaration.
///
/// The `subject` names what was declared (`bookstore::Book::title`), `at` is the
/// registration call site when known, and `upstream` is the location of the
/// owning declaration.
#[derive(Clone, Debug)]
pub struct Location {
    subject: String,
    at: Option<&'static panic::Location<'static>>,
    upstream: Option<Arc<Location>>,
}

impl Location {
    #[inline]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            at: None,
            upstream: None,
        }
    }

    #[inline]
    pub fn with_site(mut self, at: &'static panic::Location<'static>) -> Self {
        self.at = Some(at);
        self
    }

    #[inline]
    pub fn with_upstream(mut self, upstream: Arc<Location>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    #[inline]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[inline]
    pub fn site(&self) -> Option<&'static panic::Location<'static>> {
        self.at
    }

    #[inline]
    pub fn upstream(&self) -> Option<&Location> {
        self.upstream.as_deref()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)?;
        if let Some(at) = self.at {
            write!(f, " ({}:{})", at.file(), at.line())?;
        }
        if let Some(upstream) = &self.upstream {
            write!(f, ", in {upstream}")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ModelError

/// What went wrong while building or linking a model.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ModelErrorKind {
    #[error("directives `{first:?}` and `{second:?}` cannot be combined, falling back to an element")]
    ConflictingDirectives {
        first: DirectiveKind,
        second: DirectiveKind,
    },
    #[error("directive `{0:?}` is given more than once, the first one is used")]
    DuplicateDirective(DirectiveKind),
    #[error("class `{class}` already has a value property, `{member}` is mapped to an element")]
    MultipleValueProperties { class: &'static str, member: String },
    #[error("value property `{member}` cannot coexist with element content in `{class}`")]
    ValueWithElements { class: &'static str, member: String },
    #[error("attribute wildcard `{member}` must be an attribute map")]
    WildcardNotMap { member: String },
    #[error("class `{class}` has more than one attribute wildcard, `{member}` is ignored")]
    MultipleWildcards { class: &'static str, member: String },
    #[error("class `{class}` has more than one id property, `{member}` is not an id")]
    MultipleIds { class: &'static str, member: String },
    #[error("id property `{member}` must be a text leaf")]
    IdNotText { member: String },
    #[error("type `{0}` is neither a bound class nor a leaf")]
    UnresolvedType(String),
    #[error("{kind} property `{member}` must target a leaf type, found `{ty}`")]
    NonLeafTarget {
        kind: &'static str,
        member: String,
        ty: &'static str,
    },
    #[error("map property `{member}` must have a map type, falling back to an element")]
    MapShapeRequired { member: String },
    #[error("element wrapper on `{member}` requires a collection type")]
    WrapperOnSingle { member: String },
    #[error("property order names unknown property `{0}`")]
    PropOrderUnknown(String),
    #[error("property order does not list property `{0}`")]
    PropOrderMissing(String),
    #[error("constructor-only class `{class}` cannot extend `{base}`, the base is ignored")]
    ImmutableWithBase {
        class: &'static str,
        base: &'static str,
    },
    #[error("constructor-only class `{0}` has no constructor")]
    MissingConstructor(&'static str),
    #[error("structural component `{member}` on mutable class `{class}` cannot be written")]
    ComponentOnMutable { class: &'static str, member: String },
    #[error("location member `{member}` of `{class}` must be a writable `SourcePosition` and the only one")]
    InvalidLocation { class: &'static str, member: String },
    #[error("element `{0}` is declared more than once")]
    DuplicateElement(QName),
    #[error("type name `{0}` is declared more than once")]
    DuplicateTypeName(QName),
    #[error("class `{0}` is its own ancestor, the base link is cut")]
    CyclicBase(&'static str),
    #[error("metadata names member `{member}` unknown to class `{class}`")]
    UnknownMember { class: String, member: String },
}

/// A [`ModelErrorKind`] with the location it was found at.
#[derive(Error, Debug, Clone)]
#[error("{kind} [{location}]")]
pub struct ModelError {
    kind: ModelErrorKind,
    location: Location,
}

impl ModelError {
    #[inline]
    pub fn new(kind: ModelErrorKind, location: Location) -> Self {
        Self { kind, location }
    }

    #[inline]
    pub fn kind(&self) -> &ModelErrorKind {
        &self.kind
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// Every [`ModelError`] reported while building a context.
#[derive(Debug, Clone)]
pub struct ModelErrors(pub Vec<ModelError>);

impl ModelErrors {
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, ModelError> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ModelErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} model error(s):", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl core::error::Error for ModelErrors {}

// -----------------------------------------------------------------------------
// ErrorSink

/// Receiver of model errors.
///
/// Metadata readers must be given a sink before they are queried; the builder
/// registers its own collector.
pub trait ErrorSink: Send + Sync {
    fn report_error(&self, error: ModelError);
}

/// An [`ErrorSink`] that keeps every error in report order.
#[derive(Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<ModelError>>,
}

impl ErrorCollector {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Removes and returns the collected errors.
    pub fn take(&self) -> Vec<ModelError> {
        match self.errors.lock() {
            Ok(mut errors) => core::mem::take(&mut *errors),
            Err(poisoned) => core::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ErrorSink for ErrorCollector {
    fn report_error(&self, error: ModelError) {
        log::warn!("model error: {error}");
        match self.errors.lock() {
            Ok(mut errors) => errors.push(error),
            Err(poisoned) => poisoned.into_inner().push(error),
        }
    }
}

/// An [`ErrorSink`] that only logs.
#[derive(Default, Clone, Copy, Debug)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report_error(&self, error: ModelError) {
        log::warn!("model error: {error}");
    }
}

// -----------------------------------------------------------------------------
// Runtime errors

/// Failure to read or write one property on one instance.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AccessorError {
    #[error("instance is not a `{expected}`")]
    Downcast { expected: &'static str },
    #[error("expected {expected}, found {found}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },
    #[error("value `{value}` is out of range for `{target}`")]
    OutOfRange { value: String, target: &'static str },
    #[error("cannot parse `{text}` as `{target}`")]
    Parse { text: String, target: &'static str },
    #[error("property `{0}` has no setter")]
    ReadOnly(&'static str),
    #[error("property `{0}` cannot be accessed")]
    Unavailable(&'static str),
    #[error("type `{0}` has no text form")]
    NoTextForm(&'static str),
    #[error("no bound class between `{from}` and `{to}`")]
    Upcast {
        from: &'static str,
        to: &'static str,
    },
}

/// Failure to create an instance.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConstructionError {
    #[error("class `{0}` has no factory")]
    NoFactory(&'static str),
    #[error("constructor of `{0}` did not return an instance of it")]
    WrongType(&'static str),
    #[error("constructor of `{class}` asked for more arguments than it declares")]
    ArgumentsExhausted { class: &'static str },
    #[error("argument `{param}` of `{class}`: {source}")]
    Argument {
        class: &'static str,
        param: String,
        #[source]
        source: AccessorError,
    },
    #[error("{0}")]
    Custom(String),
}

/// Failure reported by a markup sink.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("markup sink failed: {0}")]
pub struct SinkError(pub String);

/// How a runtime error affects the running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The operation continues, the offending input is ignored.
    Warning,
    /// Something was lost. The [`EventHandler`](crate::EventHandler) decides whether to continue.
    Error,
    /// The operation always stops.
    Fatal,
}

/// Error of a marshal or unmarshal call.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum BindError {
    #[error("property `{property}`: {source}")]
    Accessor {
        property: String,
        #[source]
        source: AccessorError,
    },
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error("type `{0}` is not bound")]
    UnboundType(&'static str),
    #[error("value declared as `{declared}` has an unbound runtime type")]
    UnboundValue { declared: &'static str },
    #[error("type `{0}` has no root element name")]
    NoRootElement(&'static str),
    #[error("type `{0}` has no type name to write as a type override")]
    NoTypeName(&'static str),
    #[error("`{value}` is not `{declared}` or a subclass of it")]
    NotSubclass {
        value: &'static str,
        declared: &'static str,
    },
    #[error("unexpected root element `{0}`")]
    UnexpectedRoot(QName),
    #[error("unexpected element `{name}` in `{parent}`")]
    UnexpectedElement { name: QName, parent: QName },
    #[error("unexpected attribute `{name}` on `{element}`")]
    UnexpectedAttribute { name: QName, element: QName },
    #[error("wildcard attribute `{name}` on `{element}` clashes with a declared attribute")]
    DuplicateAttribute { name: QName, element: QName },
    #[error("unknown type override `{0}`")]
    UnknownTypeOverride(QName),
    #[error("type override `{name}` is not compatible with `{declared}`")]
    IncompatibleTypeOverride { name: QName, declared: &'static str },
    #[error("element `{name}`: {source}")]
    Text {
        name: QName,
        #[source]
        source: AccessorError,
    },
    #[error("markup source failed: {0}")]
    Source(String),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("document ended before the root element was complete")]
    Incomplete,
}

impl BindError {
    /// The severity of the error.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnexpectedElement { .. }
            | Self::UnexpectedAttribute { .. }
            | Self::DuplicateAttribute { .. }
            | Self::UnknownTypeOverride(_)
            | Self::IncompatibleTypeOverride { .. } => Severity::Warning,
            Self::Accessor { .. }
            | Self::Construction(_)
            | Self::UnboundType(_)
            | Self::UnboundValue { .. }
            | Self::NoRootElement(_)
            | Self::NoTypeName(_)
            | Self::NotSubclass { .. }
            | Self::Text { .. } => Severity::Error,
            Self::UnexpectedRoot(_) | Self::Source(_) | Self::Sink(_) | Self::Incomplete => {
                Severity::Fatal
            }
        }
    }

    pub(crate) fn accessor(property: impl fmt::Display, source: AccessorError) -> Self {
        Self::Accessor {
            property: alloc::format!("{property}"),
            source,
        }
    }
}

impl From<Vec<ModelError>> for ModelErrors {
    #[inline]
    fn from(value: Vec<ModelError>) -> Self {
        Self(value)
    }
}
