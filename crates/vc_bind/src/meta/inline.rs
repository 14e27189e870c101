use alloc::borrow::Cow;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::{ErrorSink, Location, LogSink, ModelError, ModelErrorKind};
use crate::meta::{Directive, DirectiveKind, MetadataReader};
use crate::nav::{
    AccessorDecl, ClassDecl, ComponentDecl, FieldDecl, Member, PackageDecl, ParamDecl,
};

// -----------------------------------------------------------------------------
// InlineReader

/// Reads the directives registered together with the declarations.
///
/// A directive kind given twice on one declaration is reported, and only the
/// first one is returned.
#[derive(Default)]
pub struct InlineReader {
    sink: Option<Arc<dyn ErrorSink>>,
}

impl InlineReader {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn sink(&self) -> &dyn ErrorSink {
        match &self.sink {
            Some(sink) => sink.as_ref(),
            None => &LogSink,
        }
    }

    fn checked<'a>(
        &self,
        directives: &'a [Directive],
        location: impl FnOnce() -> Location,
    ) -> Cow<'a, [Directive]> {
        dedup(directives, location, self.sink())
    }
}

/// Keeps the first directive of each kind, reporting the others.
pub(crate) fn dedup<'a>(
    directives: &'a [Directive],
    location: impl FnOnce() -> Location,
    sink: &dyn ErrorSink,
) -> Cow<'a, [Directive]> {
    let has_duplicate = directives
        .iter()
        .enumerate()
        .any(|(i, d)| directives[..i].iter().any(|p| p.kind() == d.kind()));
    if !has_duplicate {
        return Cow::Borrowed(directives);
    }

    let location = location();
    let mut seen: Vec<DirectiveKind> = Vec::with_capacity(directives.len());
    let mut kept = Vec::with_capacity(directives.len());
    for directive in directives {
        let kind = directive.kind();
        if seen.contains(&kind) {
            sink.report_error(ModelError::new(
                ModelErrorKind::DuplicateDirective(kind),
                location.clone(),
            ));
        } else {
            seen.push(kind);
            kept.push(directive.clone());
        }
    }
    Cow::Owned(kept)
}

impl MetadataReader for InlineReader {
    fn set_error_sink(&mut self, sink: Arc<dyn ErrorSink>) {
        self.sink = Some(sink);
    }

    fn all_field_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        field: &'a FieldDecl,
    ) -> Cow<'a, [Directive]> {
        self.checked(field.directives(), || Member::Field(field).location(owner))
    }

    fn all_accessor_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        accessor: &'a AccessorDecl,
    ) -> Cow<'a, [Directive]> {
        self.checked(accessor.directives(), || {
            Member::Accessor(accessor).location(owner)
        })
    }

    fn all_component_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        component: &'a ComponentDecl,
    ) -> Cow<'a, [Directive]> {
        self.checked(component.directives(), || {
            Member::Component(component).location(owner)
        })
    }

    fn all_parameter_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        param: &'a ParamDecl,
    ) -> Cow<'a, [Directive]> {
        self.checked(param.directives(), || param.location(owner))
    }

    fn all_class_metadata<'a>(&'a self, class: &'a ClassDecl) -> Cow<'a, [Directive]> {
        self.checked(class.directives(), || class.location())
    }

    fn all_package_metadata<'a>(&'a self, package: &'a PackageDecl) -> Cow<'a, [Directive]> {
        // several element declarations per package are expected
        Cow::Borrowed(package.directives())
    }
}

#[cfg(test)]
mod tests {
    use super::InlineReader;
    use crate::error::{ErrorCollector, ModelErrorKind};
    use crate::meta::{Directive, DirectiveKind, MetadataReader};
    use crate::nav::{Navigator, TypeHandle, TypeTable};
    use alloc::borrow::Cow;
    use alloc::string::String;
    use alloc::sync::Arc;

    #[derive(Clone, Default)]
    struct Note {
        text: String,
    }
    crate::impl_bind_object!(Note);

    #[test]
    fn duplicates_are_reported_once_and_first_wins() {
        let mut table = TypeTable::new();
        table
            .class::<Note>()
            .factory(Note::default)
            .field("text", |n| &n.text, |n| &mut n.text)
            .directive(Directive::attribute("a"))
            .directive(Directive::attribute("b"))
            .finish();

        let errors = Arc::new(ErrorCollector::new());
        let mut reader = InlineReader::new();
        reader.set_error_sink(errors.clone());

        let decl = table.class_decl(TypeHandle::of::<Note>()).unwrap();
        let field = &decl.fields()[0];
        let directives = reader.all_field_metadata(decl, field);
        assert!(matches!(directives, Cow::Owned(_)));
        assert_eq!(&*directives, &[Directive::attribute("a")]);

        let errors = errors.take();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind(),
            &ModelErrorKind::DuplicateDirective(DirectiveKind::Attribute)
        );
        assert!(errors[0].location().subject().ends_with("Note::text"));

        assert!(reader.has_field_metadata(DirectiveKind::Attribute, decl, field));
        assert!(!reader.has_class_metadata(DirectiveKind::RootElement, decl));
    }
}
