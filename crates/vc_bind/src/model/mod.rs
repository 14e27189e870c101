//! Building the binding model from declarations.
//!
//! ## Menu
//!
//! - [`PropertySeed`]: one declared member, uniform over fields, accessor pairs
//!   and structural components.
//! - [`PropertyKind`]: the classification a seed receives.
//! - [`ModelBuilder`]: walks the declarations reachable from a set of roots,
//!   classifies every seed and links the result into a [`TypeInfoSet`].
//! - [`build_model`]: the one-call form of the builder.
//!
//! Problems are never fatal here. Each one is reported to the builder's
//! [`ErrorCollector`] with its location, a fallback is applied, and the build
//! goes on so that one pass surfaces every problem.
//!
//! [`TypeInfoSet`]: crate::info::TypeInfoSet
//! [`ErrorCollector`]: crate::error::ErrorCollector

// -----------------------------------------------------------------------------
// Modules

mod builder;
mod kind;
mod link;
mod seed;

// -----------------------------------------------------------------------------
// Exports

pub use builder::{ModelBuilder, build_model};
pub use kind::PropertyKind;
pub use seed::{MemberAccess, PropertySeed};
