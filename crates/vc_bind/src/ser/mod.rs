//! Marshalling: bound instances to markup events.
//!
//! ## Menu
//!
//! - [`EventSink`]: where the [`Serializer`] writes, in document order.
//! - [`Serializer`]: the driver of one marshal call.
//! - [`EventRecorder`] / [`MarkupEvent`]: an in-memory sink that can replay
//!   what it recorded as an [`EventSource`](crate::de::EventSource).

// -----------------------------------------------------------------------------
// Modules

mod recorder;
mod serializer;

// -----------------------------------------------------------------------------
// Exports

pub use recorder::{EventRecorder, MarkupEvent};
pub use serializer::Serializer;

use crate::QName;
use crate::error::SinkError;

// -----------------------------------------------------------------------------
// EventSink

/// Receiver of markup events.
///
/// For every element the serializer calls [`start_element`](Self::start_element),
/// then [`namespace`](Self::namespace) for each namespace the element's
/// content may use, then [`attribute`](Self::attribute) for each attribute,
/// then content, then [`end_element`](Self::end_element).
pub trait EventSink {
    fn start_element(&mut self, name: &QName) -> Result<(), SinkError>;

    /// Announces a namespace used inside the current element.
    ///
    /// Writers may declare it on the current start tag. Ignored by default.
    #[inline]
    fn namespace(&mut self, uri: &str) -> Result<(), SinkError> {
        let _ = uri;
        Ok(())
    }

    fn attribute(&mut self, name: &QName, value: &str) -> Result<(), SinkError>;

    fn text(&mut self, text: &str) -> Result<(), SinkError>;

    fn end_element(&mut self, name: &QName) -> Result<(), SinkError>;
}
