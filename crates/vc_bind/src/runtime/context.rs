use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::{Any, type_name};
use std::sync::OnceLock;

use crate::de::{EventSource, Loader};
use crate::error::{BindError, ModelError, ModelErrors};
use crate::info::{ClassId, LeafCodec, LeafId, PropertyRef, TypeInfoSet};
use crate::meta::MetadataReader;
use crate::model::build_model;
use crate::nav::{Navigator, TypeHandle};
use crate::runtime::{DefaultEventHandler, EventHandler, Property, RuntimeBeanInfo};
use crate::ser::{EventSink, Serializer};
use crate::value::{BindValue, Object, Value};

// -----------------------------------------------------------------------------
// ContextOptions

/// Runtime settings of a [`BindingContext`].
///
/// # Examples
///
/// ```
/// use vc_bind::ContextOptions;
///
/// let options = ContextOptions::new().canonical_attributes(true);
/// assert!(options.canonical_attributes);
/// assert!(options.emit_type_overrides);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextOptions {
    /// Sort attributes by local name, then namespace, instead of declaration order.
    pub canonical_attributes: bool,
    /// Keep a model that reported errors instead of failing.
    pub lenient: bool,
    /// Write a type override when a value's class differs from the declared one.
    pub emit_type_overrides: bool,
}

impl ContextOptions {
    #[inline]
    pub const fn new() -> Self {
        Self {
            canonical_attributes: false,
            lenient: false,
            emit_type_overrides: true,
        }
    }

    #[inline]
    pub const fn canonical_attributes(mut self, enabled: bool) -> Self {
        self.canonical_attributes = enabled;
        self
    }

    #[inline]
    pub const fn lenient(mut self, enabled: bool) -> Self {
        self.lenient = enabled;
        self
    }

    #[inline]
    pub const fn emit_type_overrides(mut self, enabled: bool) -> Self {
        self.emit_type_overrides = enabled;
        self
    }
}

impl Default for ContextOptions {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// LoadOutcome

/// Result of an unmarshal call.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The root value.
    pub value: Value,
    /// Every instance with an id property, by id.
    pub ids: BTreeMap<String, Object>,
}

// -----------------------------------------------------------------------------
// BindingContext

/// A frozen binding model plus the runtime bean infos created from it.
///
/// The model is built once, in [`new`](Self::new). After that the context is
/// only read: bean infos are created on first use in per-class [`OnceLock`]s,
/// so any number of threads may marshal and unmarshal through one shared
/// context.
///
/// # Examples
///
/// ```
/// use vc_bind::meta::InlineReader;
/// use vc_bind::nav::{TypeHandle, TypeTable};
/// use vc_bind::ser::EventRecorder;
/// use vc_bind::{BindingContext, ContextOptions, Directive, impl_bind_object};
///
/// #[derive(Clone, Default, Debug, PartialEq)]
/// struct Note { to: String, body: String }
/// impl_bind_object!(Note);
///
/// let mut table = TypeTable::new();
/// table
///     .class::<Note>()
///     .factory(Note::default)
///     .class_directive(Directive::root("note"))
///     .field("to", |n| &n.to, |n| &mut n.to)
///     .directive(Directive::attribute("to"))
///     .field("body", |n| &n.body, |n| &mut n.body)
///     .finish();
///
/// let ctx = BindingContext::new(
///     &table,
///     &mut InlineReader::new(),
///     &[TypeHandle::of::<Note>()],
///     ContextOptions::new(),
/// )
/// .unwrap();
///
/// let note = Note { to: "Ann".into(), body: "Hi".into() };
/// let mut recorder = EventRecorder::new();
/// ctx.marshal(&note, &mut recorder).unwrap();
/// assert_eq!(recorder.to_string(), r#"<note to="Ann"><body>Hi</body></note>"#);
///
/// let back: Note = ctx.unmarshal_as(&mut recorder).unwrap();
/// assert_eq!(back, note);
/// ```
pub struct BindingContext {
    types: TypeInfoSet,
    beans: Box<[OnceLock<RuntimeBeanInfo>]>,
    options: ContextOptions,
    errors: Vec<ModelError>,
}

impl BindingContext {
    /// Builds and links the model of `roots` and every type reachable from them.
    ///
    /// Fails with every reported [`ModelError`] unless `options.lenient` is set.
    pub fn new(
        nav: &dyn Navigator,
        reader: &mut dyn MetadataReader,
        roots: &[TypeHandle],
        options: ContextOptions,
    ) -> Result<Self, ModelErrors> {
        let (types, errors) = build_model(nav, reader, roots);
        if !errors.is_empty() && !options.lenient {
            return Err(ModelErrors(errors));
        }
        Ok(Self::from_model(types, errors, options))
    }

    /// Wraps an already linked model.
    pub fn from_model(types: TypeInfoSet, errors: Vec<ModelError>, options: ContextOptions) -> Self {
        let beans = (0..types.classes().len()).map(|_| OnceLock::new()).collect();
        log::debug!(
            "binding context ready: {} classes, {} model errors",
            types.classes().len(),
            errors.len()
        );
        Self {
            types,
            beans,
            options,
            errors,
        }
    }

    #[inline]
    pub fn types(&self) -> &TypeInfoSet {
        &self.types
    }

    #[inline]
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Errors a lenient build kept going through.
    #[inline]
    pub fn model_errors(&self) -> &[ModelError] {
        &self.errors
    }

    /// The bean info of `id`, created on first request.
    ///
    /// # Panics
    ///
    /// Panics if `id` comes from another model.
    #[inline]
    pub fn bean(&self, id: ClassId) -> &RuntimeBeanInfo {
        self.beans[id.index()].get_or_init(|| RuntimeBeanInfo::new(&self.types, id, &self.options))
    }

    /// The bean info of the class bound to `ty`.
    #[inline]
    pub fn bean_for(&self, ty: TypeHandle) -> Option<&RuntimeBeanInfo> {
        self.types.class_of(ty.id()).map(|id| self.bean(id))
    }

    #[inline]
    pub fn property(&self, prop: PropertyRef) -> &Property {
        &self.bean(prop.class).properties()[prop.index]
    }

    #[inline]
    pub fn leaf_codec(&self, id: LeafId) -> &LeafCodec {
        self.types.leaf(id).codec()
    }

    /// Marshals `value` as a document, see [`marshal_with`](Self::marshal_with).
    #[inline]
    pub fn marshal<T: Any>(&self, value: &T, sink: &mut dyn EventSink) -> Result<(), BindError> {
        self.marshal_with(value, sink, &mut DefaultEventHandler)
    }

    /// Marshals `value`, an instance of a bound class with a root element
    /// name, or an [`Object`] holding one.
    pub fn marshal_with<T: Any>(
        &self,
        value: &T,
        sink: &mut dyn EventSink,
        handler: &mut dyn EventHandler,
    ) -> Result<(), BindError> {
        Serializer::new(self, sink, handler).serialize_root(value, type_name::<T>())
    }

    /// Marshals `instance` as a document whose root is `class`.
    pub fn marshal_as(
        &self,
        class: ClassId,
        instance: &dyn Any,
        sink: &mut dyn EventSink,
    ) -> Result<(), BindError> {
        Serializer::new(self, sink, &mut DefaultEventHandler).serialize_as(class, instance)
    }

    /// Unmarshals a document whose root element names a bound class.
    #[inline]
    pub fn unmarshal(&self, source: &mut dyn EventSource) -> Result<Value, BindError> {
        self.unmarshal_with(source, &mut DefaultEventHandler)
            .map(|outcome| outcome.value)
    }

    /// Unmarshals a document, reporting recoverable problems to `handler`.
    pub fn unmarshal_with(
        &self,
        source: &mut dyn EventSource,
        handler: &mut dyn EventHandler,
    ) -> Result<LoadOutcome, BindError> {
        let mut loader = Loader::new(self, None, handler);
        source.drive(&mut loader)?;
        loader.finish()
    }

    /// Unmarshals a document as an instance of `ty`, whatever its root element is named.
    pub fn unmarshal_declared(
        &self,
        ty: TypeHandle,
        source: &mut dyn EventSource,
    ) -> Result<Value, BindError> {
        let declared = self
            .types
            .type_ref(ty)
            .ok_or(BindError::UnboundType(ty.path()))?;
        let mut handler = DefaultEventHandler;
        let mut loader = Loader::new(self, Some(declared), &mut handler);
        source.drive(&mut loader)?;
        loader.finish().map(|outcome| outcome.value)
    }

    /// Unmarshals a document as a `T`.
    pub fn unmarshal_as<T: BindValue>(&self, source: &mut dyn EventSource) -> Result<T, BindError> {
        let value = self.unmarshal_declared(T::declared_type().item(), source)?;
        T::from_value(value).map_err(|source| BindError::accessor(type_name::<T>(), source))
    }
}

impl core::fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BindingContext")
            .field("classes", &self.types.classes().len())
            .field("options", &self.options)
            .field("model_errors", &self.errors.len())
            .finish()
    }
}
