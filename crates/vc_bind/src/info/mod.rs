//! The frozen binding model.
//!
//! ## Menu
//!
//! - [`ClassInfo`]: how one class maps to markup.
//! - [`PropertyInfo`]: one classified property, addressed by [`PropertyRef`].
//! - [`LeafInfo`] / [`LeafCodec`]: types written as text.
//! - [`ArrayInfo`]: list-shaped declared types.
//! - [`ElementInfo`]: named elements, global or scoped to a class.
//! - [`TypeInfoSet`]: the registry owning all of the above.
//!
//! Nodes refer to each other through [`ClassId`] and [`LeafId`] indices into
//! the owning [`TypeInfoSet`], so cyclic type graphs need no shared ownership.

// -----------------------------------------------------------------------------
// Modules

mod class;
mod element;
mod leaf;
mod property;
mod set;

// -----------------------------------------------------------------------------
// Exports

pub use class::{ClassFlags, ClassInfo};
pub use element::{ArrayInfo, ElementInfo};
pub use leaf::{LeafCodec, LeafInfo};
pub use property::{PropertyInfo, PropertyRef};
pub use set::{Ancestors, TypeInfoSet};

use core::fmt;

use crate::nav::TypeHandle;

// -----------------------------------------------------------------------------
// Ids

/// Index of a [`ClassInfo`] in its [`TypeInfoSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub(crate) u32);

/// Index of a [`LeafInfo`] in its [`TypeInfoSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafId(pub(crate) u32);

impl ClassId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl LeafId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// -----------------------------------------------------------------------------
// TypeRef

/// What a property points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A class that was not built yet. Never left in a linked model.
    Pending(TypeHandle),
    Class(ClassId),
    Leaf(LeafId),
    /// The attribute map of a wildcard property.
    Wildcard,
}

impl TypeRef {
    #[inline]
    pub fn class(self) -> Option<ClassId> {
        match self {
            Self::Class(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn leaf(self) -> Option<LeafId> {
        match self {
            Self::Leaf(id) => Some(id),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// TypeInfo

/// Result of a [`TypeInfoSet::get_type_info`] lookup.
#[derive(Clone, Copy, Debug)]
pub enum TypeInfo<'a> {
    Class(&'a ClassInfo),
    Leaf(&'a LeafInfo),
    Array(&'a ArrayInfo),
}

impl TypeInfo<'_> {
    pub fn ty(&self) -> TypeHandle {
        match self {
            Self::Class(info) => info.ty(),
            Self::Leaf(info) => info.ty(),
            Self::Array(info) => info.ty(),
        }
    }
}

impl fmt::Display for TypeInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(info) => write!(f, "class {}", info.ty()),
            Self::Leaf(info) => write!(f, "leaf {}", info.ty()),
            Self::Array(info) => write!(f, "array {}", info.ty()),
        }
    }
}
