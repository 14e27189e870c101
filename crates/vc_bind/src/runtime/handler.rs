use alloc::vec::Vec;

use crate::error::{BindError, Severity};

// -----------------------------------------------------------------------------
// EventHandler

/// Decides whether a marshal or unmarshal call goes on after an error.
///
/// Consulted for every warning and error. Fatal errors are never passed to
/// the handler, they always end the call.
///
/// Any `FnMut(&BindError) -> bool` is a handler.
pub trait EventHandler {
    /// Returns `true` to continue.
    fn handle_event(&mut self, error: &BindError) -> bool;
}

impl<F: FnMut(&BindError) -> bool> EventHandler for F {
    #[inline]
    fn handle_event(&mut self, error: &BindError) -> bool {
        self(error)
    }
}

/// Logs every event and continues.
#[derive(Default, Debug, Clone, Copy)]
pub struct DefaultEventHandler;

impl EventHandler for DefaultEventHandler {
    fn handle_event(&mut self, error: &BindError) -> bool {
        match error.severity() {
            Severity::Warning => log::warn!("{error}"),
            Severity::Error | Severity::Fatal => log::error!("{error}"),
        }
        true
    }
}

/// Records every event.
///
/// Always continues, unless built with [`strict`](Self::strict).
#[derive(Default, Debug)]
pub struct CollectingHandler {
    events: Vec<BindError>,
    stop_on_error: bool,
}

impl CollectingHandler {
    #[inline]
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            stop_on_error: false,
        }
    }

    /// A handler that continues after warnings only.
    #[inline]
    pub const fn strict() -> Self {
        Self {
            events: Vec::new(),
            stop_on_error: true,
        }
    }

    #[inline]
    pub fn events(&self) -> &[BindError] {
        &self.events
    }

    #[inline]
    pub fn into_events(self) -> Vec<BindError> {
        self.events
    }
}

impl EventHandler for CollectingHandler {
    fn handle_event(&mut self, error: &BindError) -> bool {
        let go_on = !(self.stop_on_error && error.severity() >= Severity::Error);
        self.events.push(error.clone());
        go_on
    }
}
