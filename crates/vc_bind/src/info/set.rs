use alloc::vec::Vec;
use core::any::TypeId;

use crate::QName;
use crate::hash::HashMap;
use crate::info::{
    ArrayInfo, ClassId, ClassInfo, ElementInfo, LeafId, LeafInfo, PropertyInfo, PropertyRef,
    TypeInfo, TypeRef,
};
use crate::model::PropertyKind;
use crate::nav::TypeHandle;

// -----------------------------------------------------------------------------
// TypeInfoSet

/// The registry of a built model.
///
/// Owns every [`ClassInfo`], [`LeafInfo`], [`ArrayInfo`] and [`ElementInfo`].
/// Immutable once linked, every lookup is a plain read.
#[derive(Default, Debug)]
pub struct TypeInfoSet {
    pub(crate) classes: Vec<ClassInfo>,
    pub(crate) leaves: Vec<LeafInfo>,
    pub(crate) arrays: Vec<ArrayInfo>,
    pub(crate) by_type: HashMap<TypeId, TypeRef>,
    pub(crate) array_index: HashMap<TypeId, usize>,
    pub(crate) by_type_name: HashMap<QName, TypeRef>,
    pub(crate) elements: HashMap<(Option<ClassId>, QName), usize>,
    pub(crate) element_infos: Vec<ElementInfo>,
}

impl TypeInfoSet {
    /// The class, leaf or array info of `ty`.
    pub fn get_type_info(&self, ty: TypeHandle) -> Option<TypeInfo<'_>> {
        match self.by_type.get(&ty.id()) {
            Some(TypeRef::Class(id)) => Some(TypeInfo::Class(self.class(*id))),
            Some(TypeRef::Leaf(id)) => Some(TypeInfo::Leaf(&self.leaves[id.index()])),
            _ => self
                .array_index
                .get(&ty.id())
                .map(|&index| TypeInfo::Array(&self.arrays[index])),
        }
    }

    /// The class or leaf `ty` is bound to.
    #[inline]
    pub fn type_ref(&self, ty: TypeHandle) -> Option<TypeRef> {
        self.by_type.get(&ty.id()).copied()
    }

    /// The element named `name` inside `scope`, falling back to the global one.
    pub fn get_element_info(&self, scope: Option<ClassId>, name: &QName) -> Option<&ElementInfo> {
        if scope.is_some()
            && let Some(&index) = self.elements.get(&(scope, name.clone()))
        {
            return Some(&self.element_infos[index]);
        }
        self.elements
            .get(&(None, name.clone()))
            .map(|&index| &self.element_infos[index])
    }

    #[inline]
    pub fn element_infos(&self) -> &[ElementInfo] {
        &self.element_infos
    }

    /// # Panics
    ///
    /// Panics if `id` comes from another set.
    #[inline]
    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.index()]
    }

    #[inline]
    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    #[inline]
    pub fn leaf(&self, id: LeafId) -> &LeafInfo {
        &self.leaves[id.index()]
    }

    #[inline]
    pub fn leaves(&self) -> &[LeafInfo] {
        &self.leaves
    }

    #[inline]
    pub fn arrays(&self) -> &[ArrayInfo] {
        &self.arrays
    }

    /// The class bound to the runtime type `id`.
    #[inline]
    pub fn class_of(&self, id: TypeId) -> Option<ClassId> {
        self.by_type.get(&id).and_then(|r| r.class())
    }

    /// The class or leaf with type name `name`, as written in type overrides.
    #[inline]
    pub fn type_by_name(&self, name: &QName) -> Option<TypeRef> {
        self.by_type_name.get(name).copied()
    }

    /// `id`, then its base, then the base of that, and so on.
    #[inline]
    pub fn ancestors(&self, id: ClassId) -> Ancestors<'_> {
        Ancestors {
            set: self,
            next: Some(id),
        }
    }

    /// Returns `true` if `sub` is `sup` or one of its descendants.
    #[inline]
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.ancestors(sub).any(|id| id == sup)
    }

    /// # Panics
    ///
    /// Panics if `prop` comes from another set.
    #[inline]
    pub fn property(&self, prop: PropertyRef) -> &PropertyInfo {
        &self.classes[prop.class.index()].properties[prop.index]
    }

    /// The value property of `id` if the class is simple content.
    ///
    /// That is: no attribute wildcard, and every property of the class and its
    /// ancestors is a value property whose target is a leaf. Anything else is
    /// complex content and yields `None`.
    pub fn simple_content(&self, id: ClassId) -> Option<PropertyRef> {
        if self.class(id).attribute_wildcard().is_some() {
            return None;
        }
        let mut value = None;
        for class in self.ancestors(id) {
            for (index, property) in self.class(class).properties().iter().enumerate() {
                if property.kind() != PropertyKind::Value {
                    return None;
                }
                value = Some(PropertyRef { class, index });
            }
        }
        let value = value?;
        match self.property(value).target() {
            TypeRef::Leaf(_) => Some(value),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Ancestors

/// Iterator over a class and its bases, see [`TypeInfoSet::ancestors`].
pub struct Ancestors<'a> {
    set: &'a TypeInfoSet,
    next: Option<ClassId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ClassId;

    #[inline]
    fn next(&mut self) -> Option<ClassId> {
        let current = self.next?;
        self.next = self.set.class(current).base();
        Some(current)
    }
}
