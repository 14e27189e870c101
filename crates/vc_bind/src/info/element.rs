use crate::QName;
use crate::error::Location;
use crate::info::{ClassId, TypeRef};
use crate::nav::TypeHandle;

/// A named element bound to a type, globally or inside one class.
#[derive(Clone, Debug)]
pub struct ElementInfo {
    pub(crate) name: QName,
    pub(crate) scope: Option<ClassId>,
    pub(crate) content: TypeRef,
    pub(crate) location: Location,
}

impl ElementInfo {
    #[inline]
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// The class the name is valid in, `None` for global elements.
    #[inline]
    pub fn scope(&self) -> Option<ClassId> {
        self.scope
    }

    #[inline]
    pub fn content(&self) -> TypeRef {
        self.content
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// A list-shaped declared type.
///
/// Arrays are always written item by item, they never have a transducer.
#[derive(Clone, Debug)]
pub struct ArrayInfo {
    pub(crate) ty: TypeHandle,
    pub(crate) item: TypeRef,
}

impl ArrayInfo {
    /// The container type, such as `Vec<Book>`.
    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    #[inline]
    pub fn item(&self) -> TypeRef {
        self.item
    }
}
