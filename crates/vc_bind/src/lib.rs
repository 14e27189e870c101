#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod hash;
mod name;
mod value;

pub mod de;
pub mod error;
pub mod info;
pub mod meta;
pub mod model;
pub mod nav;
pub mod runtime;
pub mod ser;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------------
// Top-Level exports

#[doc(hidden)]
pub mod __macro_exports {
    #[cfg(feature = "auto_register")]
    pub use inventory;
}

pub use error::{
    AccessorError, BindError, ConstructionError, ModelError, ModelErrors, Severity, SinkError,
};
pub use meta::Directive;
pub use name::{QName, XS_NAMESPACE, XSI_NAMESPACE, decapitalize};
pub use runtime::{BindingContext, ContextOptions, EventHandler, LoadOutcome};
pub use value::{
    AttributeMap, BindValue, DeclaredType, Instance, Object, Poly, Shape, Value, object_type_id,
};

pub use de::{EventSource, SourcePosition};
pub use ser::EventSink;
