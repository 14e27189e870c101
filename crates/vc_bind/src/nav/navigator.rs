use alloc::boxed::Box;
use core::any::Any;

use crate::hash::HashSet;
use crate::nav::{
    AccessorDecl, ClassDecl, ComponentDecl, FieldDecl, LeafDecl, Member, PackageDecl, TypeHandle,
};
use crate::value::DeclaredType;

// -----------------------------------------------------------------------------
// Navigator

/// Read-only introspection of the declared types.
///
/// The model builder only learns about types through this trait, so the
/// same builder works over any source of declarations. [`TypeTable`] is the
/// explicit-registration implementation.
///
/// Only the required methods need an implementation, the rest are derived
/// from [`ClassDecl`].
///
/// [`TypeTable`]: crate::nav::TypeTable
pub trait Navigator: Send + Sync {
    fn class_decl(&self, ty: TypeHandle) -> Option<&ClassDecl>;

    fn leaf_decl(&self, ty: TypeHandle) -> Option<&LeafDecl>;

    /// Declarations of the module `path` (see [`TypeHandle::module_path`]).
    fn package_decl(&self, path: &str) -> Option<&PackageDecl>;

    /// Resolves a full type path, as used by directives, to a handle.
    fn resolve_path(&self, path: &str) -> Option<TypeHandle>;

    /// Every declared class.
    fn class_decls(&self) -> Box<dyn Iterator<Item = &ClassDecl> + '_>;

    #[inline]
    fn superclass(&self, ty: TypeHandle) -> Option<TypeHandle> {
        self.class_decl(ty)?.base().map(|base| base.ty())
    }

    #[inline]
    fn fields(&self, ty: TypeHandle) -> &[FieldDecl] {
        self.class_decl(ty).map_or(&[], ClassDecl::fields)
    }

    #[inline]
    fn accessor_pairs(&self, ty: TypeHandle) -> &[AccessorDecl] {
        self.class_decl(ty).map_or(&[], ClassDecl::accessors)
    }

    #[inline]
    fn structural_components(&self, ty: TypeHandle) -> &[ComponentDecl] {
        self.class_decl(ty).map_or(&[], ClassDecl::components)
    }

    #[inline]
    fn declared_type(&self, member: Member<'_>) -> DeclaredType {
        member.declared_type()
    }

    #[inline]
    fn name(&self, member: Member<'_>) -> &'static str {
        member.name()
    }

    #[inline]
    fn is_record(&self, ty: TypeHandle) -> bool {
        self.class_decl(ty).is_some_and(ClassDecl::is_record)
    }

    /// Views `instance`, an instance of `ty`, as its base class.
    fn upcast<'a>(&self, ty: TypeHandle, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        self.class_decl(ty)?.base()?.upcast(instance)
    }

    /// Views `instance`, an instance of `ty`, as its base class, mutably.
    fn upcast_mut<'a>(&self, ty: TypeHandle, instance: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.class_decl(ty)?.base()?.upcast_mut(instance)
    }

    /// Returns `true` if `sub` is `sup` or declares it as a direct or indirect base.
    fn is_subclass(&self, sub: TypeHandle, sup: TypeHandle) -> bool {
        let mut visited = HashSet::default();
        let mut current = Some(sub);
        while let Some(ty) = current {
            if ty == sup {
                return true;
            }
            if !visited.insert(ty) {
                return false;
            }
            current = self.superclass(ty);
        }
        false
    }
}
