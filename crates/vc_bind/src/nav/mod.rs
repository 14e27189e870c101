//! Type introspection.
//!
//! ## Menu
//!
//! - [`TypeHandle`]: identity of a Rust type.
//! - [`ClassDecl`], [`FieldDecl`], [`AccessorDecl`], [`ComponentDecl`], [`LeafDecl`],
//!   [`PackageDecl`]: what is declared about types, members and modules.
//! - [`Navigator`]: the read-only introspection interface the model builder uses.
//! - [`TypeTable`]: a [`Navigator`] filled by explicit registration, optionally
//!   collected from all crates with [`register_types!`](crate::register_types).

// -----------------------------------------------------------------------------
// Modules

mod decl;
mod handle;
mod navigator;
mod table;

// -----------------------------------------------------------------------------
// Exports

pub use decl::{
    AccessorDecl, BaseDecl, BuildFn, ClassDecl, ComponentDecl, ConstructorDecl, FactoryFn,
    FieldDecl, GetFn, LeafDecl, Member, PackageDecl, ParamDecl, ParseFn, PrintFn, SetFn, UpcastFn,
    UpcastMutFn,
};
pub use handle::TypeHandle;
pub use navigator::Navigator;
pub use table::{ClassBuilder, RecordBuilder, TypeTable};

#[cfg(feature = "auto_register")]
pub use table::TypeRegistration;
