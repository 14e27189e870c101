//! The runtime half of a binding.
//!
//! ## Menu
//!
//! - [`BindingContext`]: owns a frozen model and creates [`RuntimeBeanInfo`]s on
//!   first use. Entry point of marshal and unmarshal calls.
//! - [`RuntimeBeanInfo`] / [`Property`]: per class and per property facts the
//!   drivers need, with one [`Accessor`] per property.
//! - [`ConstructionStager`] / [`Arguments`]: deferred creation of
//!   constructor-only instances.
//! - [`Transducer`]: text codec of simple-content types.
//! - [`EventHandler`]: decides whether a call continues after a recoverable error.

// -----------------------------------------------------------------------------
// Modules

pub(crate) mod accessor;
mod bean;
mod context;
mod handler;
mod stager;
mod transducer;

// -----------------------------------------------------------------------------
// Exports

pub use accessor::Accessor;
pub use bean::{PositionMember, Property, RuntimeBeanInfo};
pub use context::{BindingContext, ContextOptions, LoadOutcome};
pub use handler::{CollectingHandler, DefaultEventHandler, EventHandler};
pub use stager::{Arguments, ConstructionStager};
pub use transducer::Transducer;

pub(crate) use bean::{Child, referable};
pub(crate) use transducer::{parse_value, print_value};
