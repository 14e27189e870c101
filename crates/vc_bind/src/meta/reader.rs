use alloc::borrow::Cow;
use alloc::sync::Arc;

use crate::error::ErrorSink;
use crate::meta::{Directive, DirectiveKind};
use crate::nav::{AccessorDecl, ClassDecl, ComponentDecl, FieldDecl, Member, PackageDecl, ParamDecl};

// -----------------------------------------------------------------------------
// MetadataReader

/// Reads binding directives for declarations.
///
/// A reader decides where directives come from: [`InlineReader`] uses the
/// ones registered with the declarations, [`OverrideReader`] lets an external
/// [`MetadataTable`] replace them.
///
/// Only the `all_*` methods and [`set_error_sink`](Self::set_error_sink) are
/// required. The `*_metadata` and `has_*` lookups are derived from them.
///
/// [`InlineReader`]: crate::meta::InlineReader
/// [`OverrideReader`]: crate::meta::OverrideReader
/// [`MetadataTable`]: crate::meta::MetadataTable
pub trait MetadataReader: Send + Sync {
    /// Registers where problems found while reading are reported.
    ///
    /// Must be called before the reader is queried.
    fn set_error_sink(&mut self, sink: Arc<dyn ErrorSink>);

    fn all_field_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        field: &'a FieldDecl,
    ) -> Cow<'a, [Directive]>;

    fn all_accessor_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        accessor: &'a AccessorDecl,
    ) -> Cow<'a, [Directive]>;

    fn all_component_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        component: &'a ComponentDecl,
    ) -> Cow<'a, [Directive]>;

    fn all_parameter_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        param: &'a ParamDecl,
    ) -> Cow<'a, [Directive]>;

    fn all_class_metadata<'a>(&'a self, class: &'a ClassDecl) -> Cow<'a, [Directive]>;

    fn all_package_metadata<'a>(&'a self, package: &'a PackageDecl) -> Cow<'a, [Directive]>;

    /// Directives of any member kind.
    fn all_member_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        member: Member<'a>,
    ) -> Cow<'a, [Directive]> {
        match member {
            Member::Field(field) => self.all_field_metadata(owner, field),
            Member::Accessor(accessor) => self.all_accessor_metadata(owner, accessor),
            Member::Component(component) => self.all_component_metadata(owner, component),
        }
    }

    fn field_metadata(
        &self,
        kind: DirectiveKind,
        owner: &ClassDecl,
        field: &FieldDecl,
    ) -> Option<Directive> {
        find(&self.all_field_metadata(owner, field), kind)
    }

    fn has_field_metadata(&self, kind: DirectiveKind, owner: &ClassDecl, field: &FieldDecl) -> bool {
        contains(&self.all_field_metadata(owner, field), kind)
    }

    fn accessor_metadata(
        &self,
        kind: DirectiveKind,
        owner: &ClassDecl,
        accessor: &AccessorDecl,
    ) -> Option<Directive> {
        find(&self.all_accessor_metadata(owner, accessor), kind)
    }

    fn has_accessor_metadata(
        &self,
        kind: DirectiveKind,
        owner: &ClassDecl,
        accessor: &AccessorDecl,
    ) -> bool {
        contains(&self.all_accessor_metadata(owner, accessor), kind)
    }

    fn component_metadata(
        &self,
        kind: DirectiveKind,
        owner: &ClassDecl,
        component: &ComponentDecl,
    ) -> Option<Directive> {
        find(&self.all_component_metadata(owner, component), kind)
    }

    fn has_component_metadata(
        &self,
        kind: DirectiveKind,
        owner: &ClassDecl,
        component: &ComponentDecl,
    ) -> bool {
        contains(&self.all_component_metadata(owner, component), kind)
    }

    fn parameter_metadata(
        &self,
        kind: DirectiveKind,
        owner: &ClassDecl,
        param: &ParamDecl,
    ) -> Option<Directive> {
        find(&self.all_parameter_metadata(owner, param), kind)
    }

    fn has_parameter_metadata(&self, kind: DirectiveKind, owner: &ClassDecl, param: &ParamDecl) -> bool {
        contains(&self.all_parameter_metadata(owner, param), kind)
    }

    fn class_metadata(&self, kind: DirectiveKind, class: &ClassDecl) -> Option<Directive> {
        find(&self.all_class_metadata(class), kind)
    }

    fn has_class_metadata(&self, kind: DirectiveKind, class: &ClassDecl) -> bool {
        contains(&self.all_class_metadata(class), kind)
    }

    fn package_metadata(&self, kind: DirectiveKind, package: &PackageDecl) -> Option<Directive> {
        find(&self.all_package_metadata(package), kind)
    }

    fn has_package_metadata(&self, kind: DirectiveKind, package: &PackageDecl) -> bool {
        contains(&self.all_package_metadata(package), kind)
    }
}

#[inline]
fn find(directives: &[Directive], kind: DirectiveKind) -> Option<Directive> {
    directives.iter().find(|d| d.kind() == kind).cloned()
}

#[inline]
fn contains(directives: &[Directive], kind: DirectiveKind) -> bool {
    directives.iter().any(|d| d.kind() == kind)
}
