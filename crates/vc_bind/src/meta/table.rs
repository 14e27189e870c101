use alloc::borrow::Cow;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use std::sync::Mutex;

use crate::error::{ErrorSink, LogSink, ModelError, ModelErrorKind};
use crate::hash::HashSet;
use crate::meta::{Directive, MetadataReader};
use crate::nav::{AccessorDecl, ClassDecl, ComponentDecl, FieldDecl, PackageDecl, ParamDecl};

// -----------------------------------------------------------------------------
// MetadataTable

/// Directives kept outside the declarations, usually loaded with serde.
///
/// Classes are keyed by their full type path, packages by module path.
///
/// # Examples
///
#[cfg_attr(feature = "serde", doc = "```")]
#[cfg_attr(not(feature = "serde"), doc = "```ignore")]
/// use vc_bind::meta::MetadataTable;
///
/// let table: MetadataTable = ron::from_str(r#"(
///     classes: {
///         "shop::Book": (
///             directives: Some([RootElement(name: Some("volume"))]),
///             members: { "title": [Attribute(name: None)] },
///         ),
///     },
///     packages: { "shop": [Schema(namespace: "urn:shop", element_qualified: true)] },
/// )"#).unwrap();
///
/// assert_eq!(table.classes["shop::Book"].members["title"].len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataTable {
    #[cfg_attr(feature = "serde", serde(default))]
    pub classes: BTreeMap<String, ClassEntry>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub packages: BTreeMap<String, Vec<Directive>>,
}

/// External directives of one class.
///
/// `directives` replaces the class directives when present. Member and
/// parameter entries replace the directives of the member they name.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassEntry {
    #[cfg_attr(feature = "serde", serde(default))]
    pub directives: Option<Vec<Directive>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub members: BTreeMap<String, Vec<Directive>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: BTreeMap<String, Vec<Directive>>,
}

impl MetadataTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable entry of the class with path `path`, created if missing.
    pub fn class_entry(&mut self, path: impl Into<String>) -> &mut ClassEntry {
        self.classes.entry(path.into()).or_default()
    }
}

// -----------------------------------------------------------------------------
// OverrideReader

/// A [`MetadataReader`] where a [`MetadataTable`] overrides another reader.
///
/// Lookups the table has no entry for are delegated to the wrapped reader.
/// Member and parameter names in the table that the class does not declare
/// are reported when the class is first queried.
pub struct OverrideReader<R> {
    inner: R,
    table: MetadataTable,
    sink: Option<Arc<dyn ErrorSink>>,
    checked: Mutex<HashSet<TypeId>>,
}

impl<R: MetadataReader> OverrideReader<R> {
    pub fn new(inner: R, table: MetadataTable) -> Self {
        Self {
            inner,
            table,
            sink: None,
            checked: Mutex::new(HashSet::default()),
        }
    }

    #[inline]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    #[inline]
    pub fn table(&self) -> &MetadataTable {
        &self.table
    }

    fn entry(&self, class: &ClassDecl) -> Option<&ClassEntry> {
        let entry = self.table.classes.get(class.ty().path())?;
        let first_query = match self.checked.lock() {
            Ok(mut checked) => checked.insert(class.ty().id()),
            Err(poisoned) => poisoned.into_inner().insert(class.ty().id()),
        };
        if first_query {
            self.check_names(class, entry);
        }
        Some(entry)
    }

    fn check_names(&self, class: &ClassDecl, entry: &ClassEntry) {
        let sink: &dyn ErrorSink = match &self.sink {
            Some(sink) => sink.as_ref(),
            None => &LogSink,
        };
        let unknown_members = entry
            .members
            .keys()
            .filter(|name| class.member(name).is_none());
        let params = class.constructor().map_or(&[][..], |c| c.params());
        let unknown_params = entry
            .params
            .keys()
            .filter(|name| !params.iter().any(|p| p.name() == name.as_str()));
        for name in unknown_members.chain(unknown_params) {
            sink.report_error(ModelError::new(
                ModelErrorKind::UnknownMember {
                    class: String::from(class.ty().path()),
                    member: name.clone(),
                },
                class.location(),
            ));
        }
    }
}

impl<R: MetadataReader> MetadataReader for OverrideReader<R> {
    fn set_error_sink(&mut self, sink: Arc<dyn ErrorSink>) {
        self.inner.set_error_sink(sink.clone());
        self.sink = Some(sink);
    }

    fn all_field_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        field: &'a FieldDecl,
    ) -> Cow<'a, [Directive]> {
        match self.entry(owner).and_then(|e| e.members.get(field.name())) {
            Some(directives) => Cow::Borrowed(directives.as_slice()),
            None => self.inner.all_field_metadata(owner, field),
        }
    }

    fn all_accessor_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        accessor: &'a AccessorDecl,
    ) -> Cow<'a, [Directive]> {
        match self.entry(owner).and_then(|e| e.members.get(accessor.name())) {
            Some(directives) => Cow::Borrowed(directives.as_slice()),
            None => self.inner.all_accessor_metadata(owner, accessor),
        }
    }

    fn all_component_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        component: &'a ComponentDecl,
    ) -> Cow<'a, [Directive]> {
        match self.entry(owner).and_then(|e| e.members.get(component.name())) {
            Some(directives) => Cow::Borrowed(directives.as_slice()),
            None => self.inner.all_component_metadata(owner, component),
        }
    }

    fn all_parameter_metadata<'a>(
        &'a self,
        owner: &'a ClassDecl,
        param: &'a ParamDecl,
    ) -> Cow<'a, [Directive]> {
        match self.entry(owner).and_then(|e| e.params.get(param.name())) {
            Some(directives) => Cow::Borrowed(directives.as_slice()),
            None => self.inner.all_parameter_metadata(owner, param),
        }
    }

    fn all_class_metadata<'a>(&'a self, class: &'a ClassDecl) -> Cow<'a, [Directive]> {
        match self.entry(class).and_then(|e| e.directives.as_deref()) {
            Some(directives) => Cow::Borrowed(directives),
            None => self.inner.all_class_metadata(class),
        }
    }

    fn all_package_metadata<'a>(&'a self, package: &'a PackageDecl) -> Cow<'a, [Directive]> {
        match self.table.packages.get(package.path()) {
            Some(directives) => Cow::Borrowed(directives.as_slice()),
            None => self.inner.all_package_metadata(package),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MetadataTable, OverrideReader};
    use crate::error::{ErrorCollector, ModelErrorKind};
    use crate::meta::{Directive, DirectiveKind, InlineReader, MetadataReader};
    use crate::nav::{Navigator, TypeHandle, TypeTable};
    use alloc::string::String;
    use alloc::sync::Arc;

    #[derive(Clone, Default)]
    struct Memo {
        subject: String,
        body: String,
    }
    crate::impl_bind_object!(Memo);

    fn table() -> TypeTable {
        let mut table = TypeTable::new();
        table
            .class::<Memo>()
            .factory(Memo::default)
            .class_directive(Directive::root("memo"))
            .field("subject", |m| &m.subject, |m| &mut m.subject)
            .directive(Directive::element("title"))
            .field("body", |m| &m.body, |m| &mut m.body)
            .finish();
        table
    }

    #[test]
    fn table_entries_replace_inline_directives() {
        let types = table();
        let path = TypeHandle::of::<Memo>().path();

        let mut metadata = MetadataTable::new();
        let entry = metadata.class_entry(path);
        entry
            .members
            .insert(String::from("subject"), alloc::vec![Directive::attribute("topic")]);
        entry.members.insert(String::from("missing"), alloc::vec![Directive::Transient]);

        let errors = Arc::new(ErrorCollector::new());
        let mut reader = OverrideReader::new(InlineReader::new(), metadata);
        reader.set_error_sink(errors.clone());

        let decl = types.class_decl(TypeHandle::of::<Memo>()).unwrap();
        let subject = &decl.fields()[0];
        let body = &decl.fields()[1];

        assert_eq!(
            reader.field_metadata(DirectiveKind::Attribute, decl, subject),
            Some(Directive::attribute("topic"))
        );
        assert!(!reader.has_field_metadata(DirectiveKind::Element, decl, subject));
        assert!(reader.all_field_metadata(decl, body).is_empty());
        // no class directives in the table, inline ones are used
        assert!(reader.has_class_metadata(DirectiveKind::RootElement, decl));

        let errors = errors.take();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].kind(),
            ModelErrorKind::UnknownMember { member, .. } if member == "missing"
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn table_parses_from_json() {
        let json = r#"{
            "classes": {
                "shop::Memo": {
                    "directives": [{ "RootElement": { "name": "note" } }],
                    "members": { "body": ["Value"] }
                }
            }
        }"#;
        let table: MetadataTable = serde_json::from_str(json).unwrap();
        let entry = &table.classes["shop::Memo"];
        assert_eq!(entry.directives.as_deref(), Some(&[Directive::root("note")][..]));
        assert_eq!(entry.members["body"], alloc::vec![Directive::Value]);
        assert!(table.packages.is_empty());
    }
}
