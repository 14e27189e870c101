use crate::QName;
use crate::info::{ClassId, TypeRef};
use crate::model::{PropertyKind, PropertySeed};
use crate::value::Shape;

// -----------------------------------------------------------------------------
// PropertyRef

/// Address of a property: its declaring class and position there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub class: ClassId,
    pub index: usize,
}

// -----------------------------------------------------------------------------
// PropertyInfo

/// A classified property of one class.
///
/// Read-only once the model is linked.
#[derive(Clone)]
pub struct PropertyInfo {
    pub(crate) seed: PropertySeed,
    pub(crate) kind: PropertyKind,
    pub(crate) name: Option<QName>,
    pub(crate) wrapper: Option<QName>,
    pub(crate) target: TypeRef,
    pub(crate) key: Option<TypeRef>,
    pub(crate) is_id: bool,
    pub(crate) hidden_by_override: bool,
    pub(crate) dropped: bool,
}

impl PropertyInfo {
    pub(crate) fn new(seed: PropertySeed, kind: PropertyKind, target: TypeRef) -> Self {
        Self {
            seed,
            kind,
            name: None,
            wrapper: None,
            target,
            key: None,
            is_id: false,
            hidden_by_override: false,
            dropped: false,
        }
    }

    #[inline]
    pub fn seed(&self) -> &PropertySeed {
        &self.seed
    }

    /// The member name.
    #[inline]
    pub fn member_name(&self) -> &'static str {
        self.seed.name()
    }

    #[inline]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Element, attribute or map name.
    ///
    /// Value and reference properties keep the element name they fall back to,
    /// only wildcards have none.
    #[inline]
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    /// Name of the element wrapping a collection.
    #[inline]
    pub fn wrapper(&self) -> Option<&QName> {
        self.wrapper.as_ref()
    }

    /// The item type.
    #[inline]
    pub fn target(&self) -> TypeRef {
        self.target
    }

    /// Key type of a map property.
    #[inline]
    pub fn key(&self) -> Option<TypeRef> {
        self.key
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.seed.declared_type().shape()
    }

    #[inline]
    pub fn is_id(&self) -> bool {
        self.is_id
    }

    /// Some bound subclass declares a member of the same name.
    #[inline]
    pub fn is_hidden_by_override(&self) -> bool {
        self.hidden_by_override
    }
}

impl core::fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("member", &self.seed.name())
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("wrapper", &self.wrapper)
            .field("target", &self.target)
            .finish()
    }
}
