use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::QName;
use crate::error::Location;
use crate::info::{ClassId, PropertyInfo, PropertyRef};
use crate::model::PropertySeed;
use crate::nav::{BaseDecl, ConstructorDecl, FactoryFn, TypeHandle};

bitflags! {
    /// Facts about a bound class.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u8 {
        /// Instances are built by a constructor once every value is read.
        const IMMUTABLE      = 1 << 0;
        /// Some bound class names this one as its base.
        const HAS_SUBCLASSES = 1 << 1;
        /// Neither the class nor an ancestor has a value property.
        const ELEMENT_ONLY   = 1 << 2;
    }
}

// -----------------------------------------------------------------------------
// ClassInfo

/// The binding model of one class.
///
/// Created as a placeholder before its base and properties are known, so a
/// type can refer to a class that is still being built. Read-only once the
/// model is linked.
pub struct ClassInfo {
    pub(crate) id: ClassId,
    pub(crate) ty: TypeHandle,
    pub(crate) base: Option<ClassId>,
    pub(crate) upcast: Option<BaseDecl>,
    pub(crate) properties: Vec<PropertyInfo>,
    pub(crate) element_name: Option<QName>,
    pub(crate) type_name: Option<QName>,
    pub(crate) factory: Option<FactoryFn>,
    pub(crate) constructor: Option<Arc<ConstructorDecl>>,
    pub(crate) param_names: Vec<String>,
    pub(crate) flags: ClassFlags,
    pub(crate) id_property: Option<PropertyRef>,
    pub(crate) attribute_wildcard: Option<PropertyRef>,
    pub(crate) own_position: Option<PropertySeed>,
    pub(crate) position_member: Option<ClassId>,
    pub(crate) location: Location,
}

impl ClassInfo {
    pub(crate) fn placeholder(id: ClassId, ty: TypeHandle, location: Location) -> Self {
        Self {
            id,
            ty,
            base: None,
            upcast: None,
            properties: Vec::new(),
            element_name: None,
            type_name: None,
            factory: None,
            constructor: None,
            param_names: Vec::new(),
            flags: ClassFlags::empty(),
            id_property: None,
            attribute_wildcard: None,
            own_position: None,
            position_member: None,
            location,
        }
    }

    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    /// The bound base class.
    #[inline]
    pub fn base(&self) -> Option<ClassId> {
        self.base
    }

    #[inline]
    pub(crate) fn base_decl(&self) -> Option<&BaseDecl> {
        self.upcast.as_ref()
    }

    /// Own properties, in element order.
    #[inline]
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    /// Finds an own property by member name.
    pub fn property(&self, member: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.member_name() == member)
    }

    /// Returns `true` if this class itself declares a property named `member`.
    #[inline]
    pub fn declares(&self, member: &str) -> bool {
        self.property(member).is_some()
    }

    /// Root element name, when instances can be document roots.
    #[inline]
    pub fn element_name(&self) -> Option<&QName> {
        self.element_name.as_ref()
    }

    /// Type name used by type overrides. `None` for anonymous types.
    #[inline]
    pub fn type_name(&self) -> Option<&QName> {
        self.type_name.as_ref()
    }

    #[inline]
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.flags.contains(ClassFlags::IMMUTABLE)
    }

    #[inline]
    pub fn has_subclasses(&self) -> bool {
        self.flags.contains(ClassFlags::HAS_SUBCLASSES)
    }

    #[inline]
    pub fn is_element_only(&self) -> bool {
        self.flags.contains(ClassFlags::ELEMENT_ONLY)
    }

    #[inline]
    pub fn factory(&self) -> Option<&FactoryFn> {
        self.factory.as_ref()
    }

    #[inline]
    pub fn constructor(&self) -> Option<&Arc<ConstructorDecl>> {
        self.constructor.as_ref()
    }

    /// Constructor parameter names used to match staged values, in parameter order.
    #[inline]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// The id property, own or inherited.
    #[inline]
    pub fn id_property(&self) -> Option<PropertyRef> {
        self.id_property
    }

    /// The attribute wildcard, own or inherited.
    #[inline]
    pub fn attribute_wildcard(&self) -> Option<PropertyRef> {
        self.attribute_wildcard
    }

    /// The member this class declares to receive source positions.
    #[inline]
    pub fn own_position(&self) -> Option<&PropertySeed> {
        self.own_position.as_ref()
    }

    /// The class whose position member instances receive, the topmost
    /// ancestor declaring one.
    #[inline]
    pub fn position_member(&self) -> Option<ClassId> {
        self.position_member
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl core::fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClassInfo")
            .field("id", &self.id)
            .field("ty", &self.ty)
            .field("base", &self.base)
            .field("element_name", &self.element_name)
            .field("type_name", &self.type_name)
            .field("flags", &self.flags)
            .field("properties", &self.properties)
            .finish()
    }
}
